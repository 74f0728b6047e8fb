use smgen::{get_args, run};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match get_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let code = match run(config).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e}");
            1
        }
    };
    std::process::exit(code);
}
