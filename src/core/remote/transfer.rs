//! Shared HTTP agent and bounded archive download.
//!
//! Download URLs handed out by the export listing are credentialed and
//! short-lived; the fetcher streams them straight to disk with a hard
//! size cap so a misbehaving server cannot fill the temp volume.

use crate::error::TransferError;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use super::ArchiveFetcher;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(60);
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on a downloaded export archive.
pub const DEFAULT_MAX_ARCHIVE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Return a shared HTTP agent with consistent timeouts.
pub(crate) fn agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .timeout_write(WRITE_TIMEOUT)
            .build()
    })
}

/// [`ArchiveFetcher`] backed by the shared ureq agent.
pub struct HttpArchiveFetcher {
    max_bytes: u64,
}

impl HttpArchiveFetcher {
    pub fn new() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_ARCHIVE_BYTES,
        }
    }

    /// Override the download size cap.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

impl Default for HttpArchiveFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveFetcher for HttpArchiveFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64, TransferError> {
        let response = agent().get(url).call().map_err(|err| match err {
            ureq::Error::Status(status, _) => TransferError::Status { status },
            ureq::Error::Transport(transport) => TransferError::Http {
                message: transport.to_string(),
            },
        })?;
        let mut file = File::create(dest)?;
        copy_response_to_writer(response, &mut file, self.max_bytes)
    }
}

/// Stream a response body to the writer, enforcing a maximum byte size.
fn copy_response_to_writer(
    response: ureq::Response,
    writer: &mut impl Write,
    max_bytes: u64,
) -> Result<u64, TransferError> {
    check_content_length(&response, max_bytes)?;
    let reader = response.into_reader();
    let mut limited = reader.take(max_bytes + 1);
    let mut total: u64 = 0;
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = limited.read(&mut buf)?;
        if read == 0 {
            break;
        }
        total += read as u64;
        if total > max_bytes {
            return Err(TransferError::TooLarge {
                limit_bytes: max_bytes,
            });
        }
        writer.write_all(&buf[..read])?;
    }
    Ok(total)
}

fn check_content_length(response: &ureq::Response, max_bytes: u64) -> Result<(), TransferError> {
    let Some(length) = response.header("Content-Length") else {
        return Ok(());
    };
    let Ok(length) = length.parse::<u64>() else {
        return Ok(());
    };
    if length > max_bytes {
        return Err(TransferError::TooLarge {
            limit_bytes: max_bytes,
        });
    }
    Ok(())
}
