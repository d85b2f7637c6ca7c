#![cfg(unix)]
#![allow(dead_code)]

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tempfile::TempDir;
use wkconvert::Environment;

pub const STUB_PDF: &[u8] = b"%PDF-1.4 stub\n";

/// Writing an executable while another test thread forks can make exec fail
/// with ETXTBSY, so stub tests run one at a time.
pub fn serial() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// A temp dir holding one renderer stub script.
pub struct Stub {
    pub dir: TempDir,
    pub exe: PathBuf,
}

impl Stub {
    /// `body` runs after `$out` is set to the last argument.
    pub fn new(body: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let exe = dir.path().join("renderer.sh");
        let script = format!("#!/bin/sh\nfor out; do :; done\n{body}\n");
        std::fs::write(&exe, script).expect("write stub");
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        Self { dir, exe }
    }

    /// Writes [`STUB_PDF`] to the output path and exits 0.
    pub fn ok() -> Self {
        Self::new("printf '%%PDF-1.4 stub\\n' > \"$out\"")
    }

    /// Copies stdin to the output path.
    pub fn echo_stdin() -> Self {
        Self::new("cat > \"$out\"")
    }

    pub fn failing() -> Self {
        Self::new("echo 'bad font' >&2\nexit 2")
    }

    /// Records its pid in `pid` under the stub dir, then never exits.
    pub fn hanging() -> Self {
        let stub = Self::new("");
        let pid_file = stub.pid_file();
        let body = format!("echo $$ > '{}'\nexec sleep 30", pid_file.display());
        let script = format!("#!/bin/sh\n{body}\n");
        std::fs::write(&stub.exe, script).expect("write stub");
        stub
    }

    pub fn pid_file(&self) -> PathBuf {
        self.dir.path().join("pid")
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn env(&self) -> Environment {
        Environment::default()
            .with_executable(&self.exe)
            .with_temp_dir(self.dir.path())
            .with_timeout(Duration::from_secs(20))
    }

    /// Files in the stub dir other than the script itself.
    pub fn leftovers(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.dir.path())
            .expect("read_dir")
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p != &self.exe)
            .collect()
    }
}

pub fn process_gone(pid: u32) -> bool {
    if !Path::new("/proc/self").exists() {
        return true;
    }
    !Path::new(&format!("/proc/{pid}")).exists()
}

pub fn read_pid(path: &Path) -> u32 {
    std::fs::read_to_string(path)
        .expect("pid file")
        .trim()
        .parse()
        .expect("pid")
}

/// A `Write` sink that can be handed to a worker and inspected afterwards.
#[derive(Clone, Default)]
pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn bytes(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
