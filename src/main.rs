use clap::Parser;
use tandem::config::{ServerArgs, init_logging};
use tandem::signaling::SignalingServer;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = ServerArgs::parse();
    init_logging();

    println!("   Tandem Rendezvous Server");
    println!("   Binding to {}", args.bind);
    println!("   Press Ctrl+C to stop\n");

    let server = SignalingServer::bind(&args.bind).await?;

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            println!("Shutting down");
            Ok(())
        }
    }
}
