use promptqa::cli::app;

#[tokio::main]
async fn main() {
    let exit_code = app::run().await;
    std::process::exit(exit_code);
}
