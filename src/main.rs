use std::fs::OpenOptions;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use sa_kubeconfig::{DefaultResolver, MintConfig, Minter, TransportConfig};
use tracing_subscriber::EnvFilter;

const STDOUT_PATH: &str = "-";

/// Mint a short-lived service account token and write a kubeconfig that uses it.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// The service account to issue the token for
    #[arg(long, default_value = "default")]
    service_account: String,

    /// The namespace of the service account
    #[arg(long, default_value = "default")]
    namespace: String,

    /// The kubeconfig file to create (`-` for stdout) [default: <service-account>.kubeconfig]
    #[arg(long)]
    output_file: Option<PathBuf>,

    /// The requested token lifetime in seconds; the API server may shorten it
    #[arg(long, default_value_t = sa_kubeconfig::constants::DEFAULT_EXPIRATION_SECONDS)]
    expiration_seconds: i64,

    /// An audience the token is issued for (repeatable)
    #[arg(long = "audience", required = true)]
    audiences: Vec<String>,

    /// The user name written into the kubeconfig [default: <service-account>]
    #[arg(long)]
    user_name: Option<String>,

    /// The kubeconfig used to reach the cluster
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// The context to use instead of current-context
    #[arg(long)]
    context: Option<String>,

    /// Connect timeout in seconds
    #[arg(long, default_value_t = 10)]
    connect_timeout: u64,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    request_timeout: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let transport = TransportConfig {
        connect_timeout: Duration::from_secs(args.connect_timeout),
        request_timeout: Duration::from_secs(args.request_timeout),
    };
    let mut resolver = DefaultResolver::new().with_transport_config(transport);
    if let Some(path) = &args.kubeconfig {
        resolver = resolver.with_kubeconfig_path(path);
    }
    if let Some(context) = &args.context {
        resolver = resolver.with_context(context);
    }

    let mut config = MintConfig::new(&args.service_account, &args.namespace)
        .with_audiences(&args.audiences)
        .with_expiration_seconds(args.expiration_seconds);
    if let Some(user_name) = &args.user_name {
        config = config.with_identity_label(user_name);
    }

    let profile = Minter::new(resolver)
        .mint(&config)
        .await
        .with_context(|| {
            format!(
                "failed to mint a kubeconfig for {}/{}",
                args.namespace, args.service_account
            )
        })?;
    let document = profile.to_yaml()?;

    let output = args
        .output_file
        .unwrap_or_else(|| PathBuf::from(format!("{}.kubeconfig", args.service_account)));
    if output == Path::new(STDOUT_PATH) {
        io::stdout()
            .write_all(document.as_bytes())
            .context("failed to write kubeconfig to stdout")?;
        return Ok(());
    }

    write_private(&output, document.as_bytes())
        .with_context(|| format!("failed to write {}", output.display()))?;
    eprintln!("Kubeconfig file created {}", output.display());
    Ok(())
}

/// Writes `contents` to `path`, readable by the owner only.
///
/// An existing file is truncated and its permissions are narrowed before anything is written.
fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt as _;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents)?;
    file.sync_all()
}
