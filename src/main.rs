#[tokio::main]
async fn main() {
    let status = proton_frequency_lib::run().await;
    if status != 0 {
        std::process::exit(status);
    }
}
