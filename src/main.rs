#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use rentme_auth::{
    errors::SdkLoadError,
    models::{PasswordCredentials, RegistrationRequest},
    sdk::{ButtonOptions, IdConfiguration, ScriptElement},
    session::{FileStorage, MemoryStorage},
    BrowserCookieJar, ClientStorage, FlowEnvironment, IdentityCredential, IdentitySdk, MountPoint,
    Navigator, RedirectOutcome, RedirectQuery, RentmeSettings, ScriptHost, SignInFlow, UserRole,
};

#[derive(Parser)]
#[command(name = "rentme-auth", version, about = "RentMe sign-in and session client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "RENTME_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign in with a Google identity token
    Google {
        #[arg(long)]
        credential: String,
    },
    /// Create an account and sign it in
    Register {
        #[arg(long)]
        full_name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "RENTME_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        contact_number: Option<String>,
        #[arg(long, default_value = "RENTER", value_parser = parse_role)]
        role: UserRole,
    },
    /// Evaluate an OAuth callback URL the backend redirected to
    Redirect { url: String },
    /// Print the stored session
    Whoami,
    /// End the session on the backend and locally
    Logout,
}

fn parse_role(value: &str) -> Result<UserRole, String> {
    value.to_ascii_uppercase().parse()
}

/// Document without a browser: the SDK counts as installed
struct HeadlessScriptHost;

#[async_trait]
impl ScriptHost for HeadlessScriptHost {
    fn sdk_present(&self) -> bool {
        true
    }

    fn has_script(&self, _src: &str) -> bool {
        false
    }

    fn append_script(&self, script: ScriptElement) {
        log::debug!("Headless host ignoring script {}", script.src);
    }

    async fn script_loaded(&self, _src: &str) -> Result<(), SdkLoadError> {
        Ok(())
    }
}

/// Identity SDK that hands over a credential supplied on the command line
struct HeadlessSdk {
    credential: String,
}

impl IdentitySdk for HeadlessSdk {
    fn initialize(&self, config: IdConfiguration) {
        (config.callback)(IdentityCredential::new(self.credential.clone()));
    }

    fn render_button(&self, mount: &MountPoint, _options: &ButtonOptions) {
        log::debug!("Headless SDK: no button rendered into '{}'", mount.id);
    }
}

struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn push(&self, path: &str) {
        println!("→ {path}");
    }
}

/// Persistent pieces of the environment, saved back after each command
struct Environment {
    storage: Arc<dyn ClientStorage>,
    cookies: Arc<BrowserCookieJar>,
    cookie_path: Option<PathBuf>,
}

impl Environment {
    fn open(settings: &RentmeSettings) -> Result<Self> {
        let api = url::Url::parse(&settings.api.base_url)
            .with_context(|| format!("invalid API base URL {}", settings.api.base_url))?;
        let host = api.host_str().unwrap_or("localhost").to_string();

        match &settings.session.storage_path {
            Some(path) => {
                let cookie_path = PathBuf::from(format!("{path}.cookies.json"));
                let storage = FileStorage::open(path)?;
                let cookies = BrowserCookieJar::load(&host, &cookie_path)?;
                Ok(Self {
                    storage: Arc::new(storage),
                    cookies: Arc::new(cookies),
                    cookie_path: Some(cookie_path),
                })
            }
            None => Ok(Self {
                storage: Arc::new(MemoryStorage::new()),
                cookies: Arc::new(BrowserCookieJar::new(host)),
                cookie_path: None,
            }),
        }
    }

    fn flow(&self, settings: &RentmeSettings, sdk: Arc<dyn IdentitySdk>) -> Result<SignInFlow> {
        let env = FlowEnvironment {
            script_host: Arc::new(HeadlessScriptHost),
            sdk,
            navigator: Arc::new(PrintNavigator),
            storage: self.storage.clone(),
            cookies: self.cookies.clone(),
        };
        Ok(SignInFlow::new(settings, env)?)
    }

    fn save(&self) -> Result<()> {
        if let Some(path) = &self.cookie_path {
            self.cookies.save(path)?;
        }
        Ok(())
    }
}

fn report(outcome: Option<RedirectOutcome>) -> Result<()> {
    match outcome {
        Some(RedirectOutcome::Success(record)) => {
            println!("Signed in as {} ({})", record.email, record.role);
            Ok(())
        }
        Some(RedirectOutcome::Failure(reason)) => {
            Err(anyhow!("{} [{reason}]", reason.user_message()))
        }
        None => Err(anyhow!("sign-in did not start; check the Google client id")),
    }
}

async fn run(cli: Cli, settings: RentmeSettings) -> Result<()> {
    let env = Environment::open(&settings)?;
    let no_sdk: Arc<dyn IdentitySdk> = Arc::new(HeadlessSdk {
        credential: String::new(),
    });

    let result = match cli.command {
        Command::Login { email, password } => {
            let flow = env.flow(&settings, no_sdk)?;
            report(
                flow.submit_password(&PasswordCredentials { email, password })
                    .await,
            )
        }
        Command::Google { credential } => {
            let flow = env.flow(&settings, Arc::new(HeadlessSdk { credential }))?;
            report(flow.run_google(&MountPoint::detached("google-signin")).await)
        }
        Command::Register {
            full_name,
            email,
            password,
            contact_number,
            role,
        } => {
            let flow = env.flow(&settings, no_sdk)?;
            let request = RegistrationRequest {
                full_name,
                email,
                password,
                contact_number,
                role,
            };
            report(flow.submit_registration(&request).await)
        }
        Command::Redirect { url } => {
            let flow = env.flow(&settings, no_sdk)?;
            let query = RedirectQuery::from_url(&url).context("callback URL is not absolute")?;
            let state = flow.redirect_controller().evaluate(&query);
            println!("{state:?}");
            Ok(())
        }
        Command::Whoami => {
            let flow = env.flow(&settings, no_sdk)?;
            match flow.store().read() {
                Some(record) => {
                    println!("{}", serde_json::to_string_pretty(&record)?);
                    println!("dashboard section: {}", record.role.dashboard_section());
                }
                None => println!("Not signed in"),
            }
            Ok(())
        }
        Command::Logout => {
            let flow = env.flow(&settings, no_sdk)?;
            flow.logout().await;
            Ok(())
        }
    };

    env.save()?;
    result
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // This also loads .env file and initializes the logger at the configured level
    // This also loads .env file and initializes the logger
    let settings = match RentmeSettings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load settings: {e}");
            std::process::exit(2);
        }
    };

    if let Err(e) = run(cli, settings).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
