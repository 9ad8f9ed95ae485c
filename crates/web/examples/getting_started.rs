use http::{HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use sprig::router::filter::{any_filter, header};
use sprig::router::{Router, get, post};
use sprig::{Application, DateHeader, RequestContext, Server, WebError, handler_fn, middleware_fn};
use std::time::Instant;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Deserialize, Serialize, Debug)]
pub struct User {
    name: String,
    zip: String,
}

fn method_of(ctx: &RequestContext) -> String {
    ctx.method().to_string()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // logs every request, after the rest of the chain has produced the response
    let access_log = middleware_fn(|ctx, next| {
        Box::pin(async move {
            let started = Instant::now();
            let result = next.run(ctx).await;
            info!(method = %ctx.method(), path = ctx.path(), status = %ctx.response().status(), elapsed = ?started.elapsed(), "request");
            result
        })
    });

    let mut form = any_filter();
    form.or(header(http::header::CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded")))
        .or(header(http::header::CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded; charset=utf-8")));

    let api = Router::with_base_path("/api");
    let users = api
        .scope("/users")
        // curl -v -d "name=hello&zip=world" http://127.0.0.1:8080/api/users
        .route(
            "",
            post(handler_fn(|ctx| {
                Box::pin(async move {
                    let user: User = ctx.body().form().await?;
                    ctx.response_mut().set_status(StatusCode::CREATED).json(&user)?;
                    Ok::<_, WebError>(())
                })
            }))
            .with(form),
        )?
        // curl -v -H 'Content-Type: application/json' -d '{"name":"hello","zip":"world"}' http://127.0.0.1:8080/api/users
        .route(
            "",
            post(handler_fn(|ctx| {
                Box::pin(async move {
                    let user: User = ctx.body().json().await?;
                    Ok::<_, WebError>(format!("receive from method: {}, receive user: {user:?}\r\n", method_of(ctx)))
                })
            })),
        )?
        .route(
            "/:id",
            get(handler_fn(|ctx| {
                Box::pin(async move {
                    let id = ctx.param("id").unwrap_or_default().to_string();
                    Ok::<_, WebError>(serde_json::json!({ "id": id }))
                })
            })),
        )?;

    let router = api
        .nest(users)
        .route_spec(
            "GET /old",
            handler_fn(|ctx| {
                Box::pin(async move {
                    ctx.redirect_permanent("/api/users/1")?;
                    Ok::<_, WebError>(())
                })
            }),
        )?
        .route_spec(
            "GET /greeting",
            handler_fn(|ctx| {
                Box::pin(async move {
                    match ctx.accepts(&["html", "json"]) {
                        Some("html") => {
                            ctx.response_mut().html("<h1>hello</h1>");
                        }
                        _ => {
                            ctx.response_mut().json(&serde_json::json!({ "greeting": "hello" }))?;
                        }
                    }
                    Ok::<_, WebError>(())
                })
            }),
        )?;

    let application = Application::builder().development_mode(true).middleware(access_log).install(DateHeader).router(router).build();

    Server::builder().application(application).address("127.0.0.1:8080").build()?.start().await?;
    Ok(())
}
