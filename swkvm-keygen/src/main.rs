//! Writes a freshly generated symmetric key to standard output.
//!
//! `swkvm-keygen > key` produces a file the controller and every peer can
//! load with `swkvm_wire::read_key`.

use anyhow::Context;
use rand::RngCore;
use std::io::Write;
use swkvm_wire::KEY_LEN;

fn main() -> anyhow::Result<()> {
    let mut key = [0u8; KEY_LEN];
    rand::thread_rng().fill_bytes(&mut key);

    std::io::stdout()
        .write_all(&key)
        .context("failed to write key to stdout")?;
    Ok(())
}
