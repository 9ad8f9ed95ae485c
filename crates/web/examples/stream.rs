use bytes::Bytes;
use futures::stream;
use http_body::Frame;
use http_body_util::StreamBody;
use sprig::router::{Router, get};
use sprig::{Application, Server, WebError, handler_fn};
use std::convert::Infallible;

// curl -N http://127.0.0.1:8080/count
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let router = Router::new().route(
        "/count",
        get(handler_fn(|ctx| {
            Box::pin(async move {
                let frames = (0..5).map(|i| Ok::<_, Infallible>(Frame::data(Bytes::from(format!("{i}\n")))));
                ctx.response_mut().set_header(http::header::CONTENT_TYPE, "text/plain")?.stream(StreamBody::new(stream::iter(frames)));
                Ok::<_, WebError>(())
            })
        })),
    )?;

    let application = Application::builder().router(router).build();
    Server::builder().application(application).address("127.0.0.1:8080").build()?.start().await?;
    Ok(())
}
