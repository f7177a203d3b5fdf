//! JavaScript execution context.
//!
//! Runs `node -e <bootstrap>` as a long-lived evaluator. Snippets are
//! compiled with `new Function('stdin', code)` and invoked with the
//! run's stdin text; console output is collected per call, with each
//! argument rendered through `JSON.stringify` (string arguments come
//! out quoted) and `String(...)` when stringification throws.

use std::path::PathBuf;

use crate::core_types::LanguageId;
use crate::runtimes::driver::{DriverEngine, DriverSpec};

pub const DRIVER: DriverSpec = DriverSpec {
    language: LanguageId::JavaScript,
    primary: "node",
    fallback: "nodejs",
    args: &[],
    program_flag: "-e",
    bootstrap: BOOTSTRAP,
};

pub fn engine(interpreter: Option<PathBuf>) -> DriverEngine {
    DriverEngine::new(DRIVER, interpreter)
}

// A non-undefined completion value is appended to stdout in the same
// encoding as console arguments. The Buffer round-trip replaces lone
// surrogates that would not survive JSON transport.
const BOOTSTRAP: &str = r##"
process.stdout.write(JSON.stringify({ kind: 'loading', message: 'node evaluator up' }) + '\n');
const readline = require('readline');

const clean = (text) => Buffer.from(text, 'utf8').toString('utf8');

const render = (value) => {
  try { return JSON.stringify(value); } catch (_) { return String(value); }
};

function runCode(code, stdinText) {
  let output = '';
  let error = '';
  const oldLog = console.log;
  const oldError = console.error;
  console.log = function () {
    output += Array.from(arguments).map(render).join(' ') + '\n';
  };
  console.error = function () {
    error += Array.from(arguments).map(render).join(' ') + '\n';
  };
  try {
    const fn = new Function('stdin', code);
    const res = fn(stdinText);
    if (res !== undefined) {
      output += render(res) + '\n';
    }
  } catch (err) {
    error += err.toString() + '\n';
  }
  console.log = oldLog;
  console.error = oldError;
  return { stdout: output, stderr: error };
}

const send = (reply) => process.stdout.write(JSON.stringify(reply) + '\n');

const lines = readline.createInterface({ input: process.stdin, terminal: false });
lines.on('line', (line) => {
  line = line.trim();
  if (!line) { return; }
  try {
    const message = JSON.parse(line);
    if (message.kind !== 'run') {
      send({ kind: 'error', error: 'unsupported request: ' + message.kind });
      return;
    }
    const result = runCode(message.code || '', message.stdin || '');
    send({ kind: 'result', stdout: clean(result.stdout), stderr: clean(result.stderr) });
  } catch (err) {
    send({ kind: 'result', stdout: '', stderr: err.toString() + '\n' });
  }
});

send({ kind: 'ready' });
"##;
