#[tokio::main]
async fn main() {
    if let Err(e) = p2pool_notifier_lib::run().await {
        eprintln!("p2pool-notifier: {e}");
        std::process::exit(1);
    }
}
