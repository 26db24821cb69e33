#[tokio::main]
async fn main() {
    if let Err(e) = healthconnect_lib::run().await {
        eprintln!("healthconnect: {e}");
        std::process::exit(1);
    }
}
