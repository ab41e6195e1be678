//! Command-line configuration, with environment-variable fallbacks for every
//! flag so the balancer can be configured the same way in a shell or a
//! container manifest.

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "lb", about = "Traffic-balanced HTTP forwarder")]
pub struct Cli {
    /// Port the balancer listens on.
    #[arg(long, env = "LB_PORT", default_value_t = 8090)]
    pub port: u16,

    /// Timeout applied to each forwarded request, in seconds.
    #[arg(long = "timeout-sec", env = "LB_TIMEOUT_SEC", default_value_t = 3)]
    pub timeout_sec: u64,

    /// Speak HTTPS to backend origins instead of plain HTTP.
    #[arg(long, env = "LB_HTTPS", default_value_t = false)]
    pub https: bool,

    /// Add an `Lb-from` response header naming the origin that served the
    /// request.
    #[arg(long, env = "LB_TRACE", default_value_t = false)]
    pub trace: bool,
}

impl Cli {
    pub fn scheme(&self) -> &'static str {
        if self.https {
            "https"
        } else {
            "http"
        }
    }
}
