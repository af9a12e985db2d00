//! `sopforge server` — Start the sopforge HTTP backend server.

pub async fn run(
    host: String,
    port: u16,
    db_path: String,
    upload_dir: String,
    static_dir: Option<String>,
) -> Result<(), String> {
    let config = sopforge_server::ServerConfig {
        host: host.clone(),
        port,
        db_path,
        upload_dir,
        static_dir,
        ..Default::default()
    };

    println!("Starting sopforge server on {}:{}...", host, port);

    let addr = sopforge_server::start_server(config).await?;
    println!("Sopforge server listening on http://{}", addr);

    // Keep the process running until interrupted
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;

    println!("\nShutting down...");
    Ok(())
}
