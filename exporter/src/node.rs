use std::io;
use std::process::{Command, ExitStatus};

use log::debug;
use serde::Deserialize;
use thiserror::Error;

/// One address-touching event reported by `getaddressdeltas`. A single
/// transaction may produce several deltas for the same address.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressDelta {
    pub txid: String,
    pub satoshis: i64,
}

#[derive(Debug, Error)]
pub enum NodeToolError {
    #[error("cannot find {command} ({source})")]
    NotFound {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("{command} exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("unparseable getaddressdeltas output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Run the node command-line tool and collect every delta for `wallet`.
pub fn address_deltas(cli_path: &str, wallet: &str) -> Result<Vec<AddressDelta>, NodeToolError> {
    let params = serde_json::json!({ "addresses": [wallet] }).to_string();
    debug!("Running command: {cli_path} getaddressdeltas {params}");

    let output = Command::new(cli_path)
        .arg("getaddressdeltas")
        .arg(&params)
        .output()
        .map_err(|source| NodeToolError::NotFound {
            command: cli_path.to_string(),
            source,
        })?;
    if !output.status.success() {
        return Err(NodeToolError::Failed {
            command: format!("{cli_path} getaddressdeltas {params}"),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    parse_deltas(&output.stdout)
}

/// Parse the tool's stdout. Some builds print a banner ending in "main"
/// before the JSON body; when the plain parse fails, retry on everything
/// after that marker.
pub fn parse_deltas(stdout: &[u8]) -> Result<Vec<AddressDelta>, NodeToolError> {
    match serde_json::from_slice(stdout) {
        Ok(deltas) => Ok(deltas),
        Err(err) => {
            let text = String::from_utf8_lossy(stdout);
            match text.split_once("main\n") {
                Some((_, rest)) => Ok(serde_json::from_str(rest)?),
                None => Err(err.into()),
            }
        }
    }
}
