use sprig::router::{Router, get};
use sprig::{Application, DateHeader, Server, WebError, handler_fn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let router = Router::new().route("/", get(handler_fn(|_ctx| Box::pin(async move { Ok::<_, WebError>("hello world") }))))?;

    let application = Application::builder().install(DateHeader).router(router).build();

    Server::builder().application(application).address("127.0.0.1:3000").build()?.start().await?;
    Ok(())
}
