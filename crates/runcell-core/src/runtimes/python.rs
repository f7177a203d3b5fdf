//! Python execution context.
//!
//! Runs `python3 -u -c <bootstrap>` and keeps the interpreter alive
//! across runs. Each snippet executes under `exec` with fresh globals
//! while the standard streams are swapped for in-memory buffers, so one
//! run cannot leak names or redirected streams into the next.

use std::path::PathBuf;

use crate::core_types::LanguageId;
use crate::runtimes::driver::{DriverEngine, DriverSpec};

pub const DRIVER: DriverSpec = DriverSpec {
    language: LanguageId::Python,
    primary: "python3",
    fallback: "python",
    args: &["-u"],
    program_flag: "-c",
    bootstrap: BOOTSTRAP,
};

pub fn engine(interpreter: Option<PathBuf>) -> DriverEngine {
    DriverEngine::new(DRIVER, interpreter)
}

// Stream restoration is finally-protected so a SystemExit mid-run
// cannot wedge the protocol channel behind a StringIO. Output is
// re-encoded with replacement before json.dumps because user code can
// print lone surrogates that would otherwise kill the write.
const BOOTSTRAP: &str = r##"
import sys
print('{"kind": "loading", "message": "interpreter up, preparing sandbox"}', flush=True)
import io, json, traceback

channel = sys.stdout
requests = sys.stdin

def send(message):
    channel.write(json.dumps(message) + "\n")
    channel.flush()

def clean(text):
    return text.encode("utf-8", "replace").decode("utf-8")

def run_code(code, stdin_text):
    old_stdin = sys.stdin
    old_stdout = sys.stdout
    old_stderr = sys.stderr
    sys.stdin = io.StringIO(stdin_text)
    sys.stdout = io.StringIO()
    sys.stderr = io.StringIO()
    try:
        try:
            exec(code, {})
        except Exception:
            traceback.print_exc()
        return sys.stdout.getvalue(), sys.stderr.getvalue()
    finally:
        sys.stdin = old_stdin
        sys.stdout = old_stdout
        sys.stderr = old_stderr

send({"kind": "ready"})

for line in requests:
    line = line.strip()
    if not line:
        continue
    try:
        message = json.loads(line)
        if message.get("kind") != "run":
            send({"kind": "error", "error": "unsupported request: %r" % message.get("kind")})
            continue
        out, err = run_code(message.get("code", ""), message.get("stdin", ""))
        send({"kind": "result", "stdout": clean(out), "stderr": clean(err)})
    except BaseException:
        send({"kind": "result", "stdout": "", "stderr": clean(traceback.format_exc())})
"##;
