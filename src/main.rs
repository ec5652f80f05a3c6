use byd_hvs_bridge::prelude::*;

#[tokio::main]
async fn main() {
    let options = Options::new();

    match byd_hvs_bridge::app(options).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(_) => std::process::exit(255),
    }
}
