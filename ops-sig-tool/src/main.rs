use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use ops_sig::mock_request::MockRequest;
use ops_sig::{AuthHandler, CanonicalizeConfig, ClientRequestLike, SigningExt};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
enum Mode {
    /// Print the canonical request string that would be signed.
    Canonicalize,
    /// Print the request with the X-Ops authentication headers added.
    Sign,
}

#[derive(Debug, StructOpt)]
#[structopt(about = "Signs a raw HTTP request read from stdin with X-Ops headers.")]
struct Opt {
    #[structopt(subcommand)]
    mode: Mode,

    /// The user id to sign as.
    #[structopt(short, long)]
    user_id: String,

    /// A PEM encoded RSA private key file (PKCS#1 or PKCS#8).
    #[structopt(short = "k", long, parse(from_os_str))]
    private_key: PathBuf,

    /// Sign as of this RFC 3339 time instead of now.
    #[structopt(short, long)]
    timestamp: Option<DateTime<Utc>>,

    /// Include the query string in the hashed path.
    #[structopt(long)]
    include_query: bool,

    /// Do not collapse repeated slashes in the hashed path.
    #[structopt(long)]
    keep_slashes: bool,
}

impl Opt {
    fn handler(&self) -> Result<AuthHandler, Box<dyn Error>> {
        let pem = fs::read(&self.private_key)
            .with_context(|| format!("reading {}", self.private_key.display()))?;

        let config = CanonicalizeConfig::new()
            .with_include_query(self.include_query)
            .with_collapse_slashes(!self.keep_slashes);

        let mut handler = AuthHandler::new(&self.user_id, pem)
            .with_context(|| format!("loading {}", self.private_key.display()))?
            .with_canonicalize_config(config);

        if let Some(timestamp) = self.timestamp {
            handler.set_clock(move || timestamp);
        }

        Ok(handler)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let opt = Opt::from_args();
    let handler = opt.handler()?;

    let mut req = MockRequest::from_reader(&mut io::stdin().lock())?;

    log::info!("{:?}", req);

    match opt.mode {
        Mode::Canonicalize => {
            let method = req.method().as_str().to_owned();
            let canonical =
                handler.canonical_request(&method, req.path(), req.body().unwrap_or_default());
            io::stdout().lock().write_all(canonical.to_string().as_bytes())?;
        }
        Mode::Sign => {
            req.sign(&handler)?;
            req.write(&mut io::stdout().lock())?;
        }
    }

    Ok(())
}
