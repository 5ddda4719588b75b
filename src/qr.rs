//! QR code rendering for the connection URL.
//!
//! Uses Unicode half-block characters so two QR rows fit in one terminal
//! row, which gives a roughly square code since terminal cells are ~2:1
//! (height:width).

use anyhow::{Context, Result};
use qrcodegen::{QrCode, QrCodeEcc};

/// Quiet zone around the code, in modules.
const QUIET_ZONE: i32 = 2;

/// Render `data` as terminal lines.
///
/// Uses the lowest error correction level, which keeps the code as small as
/// possible for a short URL shown on a screen.
pub fn qr_code_lines(data: &str) -> Result<Vec<String>> {
    let code = QrCode::encode_text(data, QrCodeEcc::Low)
        .map_err(|e| anyhow::anyhow!("{e:?}"))
        .with_context(|| format!("Cannot encode {} bytes as a QR code", data.len()))?;

    let size = code.size();
    let total = size + QUIET_ZONE * 2;

    // get_module() reports light outside the symbol, which covers the quiet zone.
    let dark = |x: i32, y: i32| code.get_module(x - QUIET_ZONE, y - QUIET_ZONE);

    // ▀ = upper dark, ▄ = lower dark, █ = both, ' ' = neither
    let lines = (0..total)
        .step_by(2)
        .map(|upper_y| {
            (0..total)
                .map(|x| match (dark(x, upper_y), dark(x, upper_y + 1)) {
                    (true, true) => '█',
                    (true, false) => '▀',
                    (false, true) => '▄',
                    (false, false) => ' ',
                })
                .collect()
        })
        .collect();

    Ok(lines)
}

/// Print the connection banner with a scannable QR code to stdout.
pub fn print_connection_banner(url: &str, show_qr: bool) {
    println!("\nVH Notify Server running on {url}");

    if show_qr {
        match qr_code_lines(url) {
            Ok(lines) => {
                println!("Scan this QR code on your phone:\n");
                for line in lines {
                    println!("  {line}");
                }
            }
            Err(e) => log::warn!("QR code unavailable: {e:#}"),
        }
    }

    println!("\nOr open: {url}");
    println!("\nWaiting for connections... (Ctrl+C to stop)\n");
}
