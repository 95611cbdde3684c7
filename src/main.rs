use edgerun::edge_app;
use edgerun::edge_runtime::EdgeRuntime;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config_path = edge_app::parse_command_line();

    let runtime = EdgeRuntime::from_config_path(&config_path)?;
    edgerun::dispatch::serve(&runtime).await
}
