use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// 临时产物登记表。每次生成登记自己的文件，句柄释放时删除并注销；
/// 进程退出前调用 `cleanup_all` 清理残留。
#[derive(Debug)]
pub struct ArtifactRegistry {
    dir: Option<PathBuf>,
    prefix: String,
    active: Mutex<HashSet<PathBuf>>,
}

impl ArtifactRegistry {
    pub fn new(dir: Option<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir,
            prefix: prefix.into(),
            active: Mutex::new(HashSet::new()),
        }
    }

    /// 使用系统临时目录。
    pub fn in_temp_dir(prefix: impl Into<String>) -> Self {
        Self::new(None, prefix)
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 创建并登记一个新的空产物文件。
    pub fn create(self: &Arc<Self>, suffix: &str) -> io::Result<ArtifactHandle> {
        let dir = self.dir.clone().unwrap_or_else(std::env::temp_dir);
        fs::create_dir_all(&dir)?;
        let file = tempfile::Builder::new()
            .prefix(&format!("{}_", self.prefix))
            .suffix(suffix)
            .tempfile_in(&dir)?;
        let (_, path) = file.keep().map_err(|err| err.error)?;
        self.lock().insert(path.clone());
        debug!(path = %path.display(), "登记临时产物");
        Ok(ArtifactHandle {
            path,
            registry: Arc::clone(self),
        })
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_registered(&self, path: &Path) -> bool {
        self.lock().contains(path)
    }

    /// 删除并注销单个文件，返回该路径此前是否已登记。
    pub fn cleanup_file(&self, path: &Path) -> bool {
        let registered = self.lock().remove(path);
        remove_quietly(path);
        registered
    }

    /// 清理全部残留产物，返回清理数量。
    pub fn cleanup_all(&self) -> usize {
        let paths: Vec<PathBuf> = self.lock().drain().collect();
        for path in &paths {
            remove_quietly(path);
        }
        if !paths.is_empty() {
            debug!(count = paths.len(), "已清理残留临时产物");
        }
        paths.len()
    }
}

fn remove_quietly(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "删除临时产物失败"),
    }
}

/// 已登记产物的作用域句柄，释放时删除文件。
#[derive(Debug)]
pub struct ArtifactHandle {
    path: PathBuf,
    registry: Arc<ArtifactRegistry>,
}

impl ArtifactHandle {
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn size(&self) -> io::Result<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    /// 一次性读取整个产物。
    pub fn read_all(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }

    /// 按固定大小分块读取，内存占用与块大小成正比。
    pub fn chunks(self, chunk_size: usize) -> io::Result<ArtifactChunks> {
        let file = File::open(&self.path)?;
        Ok(ArtifactChunks {
            file,
            chunk_size: chunk_size.max(1),
            finished: false,
            _handle: self,
        })
    }
}

impl Drop for ArtifactHandle {
    fn drop(&mut self) {
        self.registry.cleanup_file(&self.path);
    }
}

/// 分块迭代器，持有句柄直至读完后释放。
#[derive(Debug)]
pub struct ArtifactChunks {
    file: File,
    chunk_size: usize,
    finished: bool,
    _handle: ArtifactHandle,
}

impl Iterator for ArtifactChunks {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let mut buffer = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < buffer.len() {
            match self.file.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(read) => filled += read,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            }
        }
        if filled < buffer.len() {
            self.finished = true;
        }
        if filled == 0 {
            return None;
        }
        buffer.truncate(filled);
        Some(Ok(buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(dir: &Path) -> Arc<ArtifactRegistry> {
        Arc::new(ArtifactRegistry::new(Some(dir.to_path_buf()), "test"))
    }

    #[test]
    fn handle_drop_removes_file_and_deregisters() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let registry = registry(dir.path());
        let handle = registry.create(".dxf").expect("创建产物失败");
        let path = handle.path().to_path_buf();
        assert!(path.exists());
        assert!(registry.is_registered(&path));
        assert!(handle.filename().starts_with("test_"));

        drop(handle);
        assert!(!path.exists());
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn chunks_are_bounded_and_cover_the_file() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let registry = registry(dir.path());
        let handle = registry.create(".dxf").expect("创建产物失败");
        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(handle.path(), &payload).expect("写入失败");
        let path = handle.path().to_path_buf();

        let chunks: Vec<Vec<u8>> = handle
            .chunks(4096)
            .expect("打开失败")
            .collect::<io::Result<_>>()
            .expect("读取失败");
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|chunk| chunk.len() <= 4096));
        assert_eq!(chunks.concat(), payload);
        assert!(!path.exists());
    }

    #[test]
    fn cleanup_all_removes_leftovers() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let registry = registry(dir.path());
        let first = registry.create(".dxf").expect("创建产物失败");
        let second = registry.create(".dxf").expect("创建产物失败");
        let paths = [first.path().to_path_buf(), second.path().to_path_buf()];
        std::mem::forget(first);
        std::mem::forget(second);

        assert_eq!(registry.cleanup_all(), 2);
        assert!(paths.iter().all(|path| !path.exists()));
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn concurrent_registration_is_consistent() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let registry = registry(dir.path());
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let handle = registry.create(".dxf").expect("创建产物失败");
                    handle.size().expect("读取大小失败")
                })
            })
            .collect();
        for worker in workers {
            assert_eq!(worker.join().expect("线程异常"), 0);
        }
        assert_eq!(registry.active_count(), 0);
    }
}
