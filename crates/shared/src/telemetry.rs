use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// トレーシングサブスクライバーを初期化
///
/// `RUST_LOG` 未設定時は `info`。本番は JSON、開発は人が読みやすい形式で出力します。
pub fn init_tracing(json: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().with_target(false).json()))
        .with((!json).then(fmt::layer))
        .try_init()?;

    Ok(())
}
