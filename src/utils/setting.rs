// rds-restore/src/utils/setting.rs
use tracing::{Span, error, info};

use crate::errors::{RestoreError, Result};

/// Resolves the database host before connecting so that DNS and VPC
/// misconfiguration is reported as such instead of as a generic connect error.
pub async fn check_host_resolves(host: &str, port: u16, span: &Span) -> Result<()> {
    info!(parent: span, "Testing DNS resolution for {}...", host);
    match tokio::net::lookup_host((host, port)).await {
        Ok(mut addrs) => match addrs.next() {
            Some(addr) => {
                info!(parent: span, "DNS resolution successful: {} -> {}", host, addr.ip());
                Ok(())
            }
            None => Err(unresolvable(host, "no addresses returned", span)),
        },
        Err(e) => Err(unresolvable(host, &e.to_string(), span)),
    }
}

fn unresolvable(host: &str, reason: &str, span: &Span) -> RestoreError {
    error!(parent: span, "DNS resolution failed for {}: {}", host, reason);
    error!(
        parent: span,
        "Check that the function runs in the database VPC with DNS resolution enabled, \
         and that its subnets and security groups allow access"
    );
    RestoreError::Database(format!(
        "Cannot resolve hostname {}. The function may not be in the correct VPC or DNS resolution is not working.",
        host
    ))
}
