//! Access-gate wrapping
//!
//! Rewrites a Node program so that it asks for a passphrase on stdin before the
//! original code runs. The passphrase is embedded base64-encoded, which keeps it
//! out of plain sight but anyone reading the artifact can recover it. This is an
//! inconvenience for casual users, not access control.

use base64::{engine::general_purpose, Engine as _};

/// Marker line placed right before the embedded source
pub const SOURCE_START_MARKER: &str = "// ORIGINAL CODE START";
/// Marker line placed right after the embedded source
pub const SOURCE_END_MARKER: &str = "// ORIGINAL CODE END";

/// Wrap `source` in a passphrase prompt
///
/// The source is embedded byte-for-byte inside the success callback; it is
/// never parsed or validated. On a wrong answer the program prints a failure
/// message and exits with status 1.
pub fn wrap(source: &str, passphrase: &str) -> String {
    let encoded = general_purpose::STANDARD.encode(passphrase.as_bytes());

    let mut wrapped = String::with_capacity(source.len() + 768);
    wrapped.push_str("(async () => {\n");
    wrapped.push_str("  const readline = require('readline');\n");
    wrapped.push_str(&format!(
        "  const passwordBuffer = Buffer.from('{}', 'base64');\n",
        encoded
    ));
    wrapped.push_str("  const correctPassword = passwordBuffer.toString('utf8');\n");
    wrapped.push_str(
        "  const rl = readline.createInterface({ input: process.stdin, output: process.stdout });\n",
    );
    wrapped.push_str("  console.clear();\n");
    wrapped.push_str("  console.log(\"\u{1F511} ENTER PASSWORD:\");\n");
    wrapped.push_str("  rl.question('> ', (inputPassword) => {\n");
    wrapped.push_str("    if (inputPassword !== correctPassword) {\n");
    wrapped.push_str("      console.log(\"\u{274C} WRONG PASSWORD\");\n");
    wrapped.push_str("      process.exit(1);\n");
    wrapped.push_str("    }\n");
    wrapped.push_str("    ");
    wrapped.push_str(SOURCE_START_MARKER);
    wrapped.push('\n');
    wrapped.push_str(source);
    wrapped.push('\n');
    wrapped.push_str("    ");
    wrapped.push_str(SOURCE_END_MARKER);
    wrapped.push('\n');
    wrapped.push_str("    rl.close();\n");
    wrapped.push_str("  });\n");
    wrapped.push_str("})();");
    wrapped
}
