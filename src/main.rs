// Logs go to stderr so stdout stays valid JSON
#[tokio::main]
async fn main() -> std::process::ExitCode {
    scansage_lib::run().await
}
