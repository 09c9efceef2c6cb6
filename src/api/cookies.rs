//! Cookie jar persisted as JSON so sessions survive between runs.
use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use log::{debug, warn};
use reqwest::{cookie::CookieStore, header::HeaderValue};
use reqwest_cookie_store::CookieStoreMutex;
use url::Url;

/// A [`CookieStore`] that writes its persistent cookies to `path` every time the server sets one.
///
/// Parsing, domain/path matching, `Secure` and expiry are handled by `cookie_store`.
#[derive(Debug)]
pub struct CookieFile {
    path: PathBuf,
    jar: CookieStoreMutex,
}

impl CookieFile {
    /// Loads the jar at `path`, starting empty when the file does not exist yet.
    ///
    /// A file that cannot be parsed is ignored with a warning and overwritten on the next save.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, io::Error> {
        let path = path.into();

        let store = match File::open(&path) {
            Ok(file) => cookie_store::CookieStore::load_json(BufReader::new(file))
                .unwrap_or_else(|error| {
                    warn!("Ignoring unreadable cookie file {}: {}", path.display(), error);
                    cookie_store::CookieStore::default()
                }),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                cookie_store::CookieStore::default()
            }
            Err(error) => return Err(error),
        };

        debug!(
            "Loaded {} cookies from {}",
            store.iter_unexpired().count(),
            path.display()
        );

        Ok(Self {
            path,
            jar: CookieStoreMutex::new(store),
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of unexpired cookies currently held.
    pub fn len(&self) -> usize {
        self.jar
            .lock()
            .map_or(0, |jar| jar.iter_unexpired().count())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes the persistent, unexpired cookies. Session cookies stay in memory.
    fn save(&self) -> Result<(), cookie_store::Error> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(File::create(&self.path)?);
        self.jar
            .lock()
            .map_err(|_| "cookie jar lock poisoned")?
            .save_json(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

impl CookieStore for CookieFile {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        self.jar.set_cookies(cookie_headers, url);

        if let Err(error) = self.save() {
            warn!("Failed to save cookies to {}: {}", self.path.display(), error);
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.jar.cookies(url)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    fn set(store: &CookieFile, url: &str, headers: &[&str]) {
        let values: Vec<HeaderValue> = headers
            .iter()
            .map(|header| HeaderValue::from_str(header).unwrap())
            .collect();
        store.set_cookies(&mut values.iter(), &Url::parse(url).unwrap());
    }

    /// Cookie pairs sent to `url`, sorted so the assertion does not depend on jar order.
    fn sent(store: &CookieFile, url: &str) -> Vec<String> {
        let Some(header) = store.cookies(&Url::parse(url).unwrap()) else {
            return Vec::new();
        };
        let mut pairs: Vec<String> = header
            .to_str()
            .unwrap()
            .split("; ")
            .map(str::to_string)
            .collect();
        pairs.sort();
        pairs
    }

    #[test]
    fn persistent_cookies_survive_a_reload() {
        let dir = TempDir::new("cookies").unwrap();
        let path = dir.path().join("cookies.json");
        let url = "https://civitai.com/api/trpc/image.get";

        let store = CookieFile::load(&path).unwrap();
        assert!(store.is_empty());
        set(
            &store,
            url,
            &[
                "session=abc; Path=/; Max-Age=3600; HttpOnly",
                "theme=dark; Domain=civitai.com; Max-Age=3600",
                "scratch=1; Path=/",
            ],
        );
        assert_eq!(store.len(), 3);

        // the session cookie without an expiry is not written
        let reloaded = CookieFile::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(sent(&reloaded, url), ["session=abc", "theme=dark"]);
    }

    #[test]
    fn domain_cookies_reach_subdomains_only() {
        let dir = TempDir::new("cookies").unwrap();
        let store = CookieFile::load(dir.path().join("cookies.json")).unwrap();
        set(&store, "https://civitai.com/", &["token=1; Domain=civitai.com"]);

        assert_eq!(sent(&store, "https://image.civitai.com/a"), ["token=1"]);
        assert!(sent(&store, "https://notcivitai.com/").is_empty());
    }

    #[test]
    fn secure_cookies_stay_on_https_within_their_path() {
        let dir = TempDir::new("cookies").unwrap();
        let store = CookieFile::load(dir.path().join("cookies.json")).unwrap();
        set(&store, "https://civitai.com/api/x", &["sid=SECRET; Path=/api; Secure"]);

        assert_eq!(sent(&store, "https://civitai.com/api/trpc"), ["sid=SECRET"]);
        assert!(sent(&store, "http://civitai.com/api/trpc").is_empty());
        assert!(sent(&store, "https://civitai.com/other").is_empty());
        assert!(sent(&store, "http://civitai.com/other").is_empty());
    }

    #[test]
    fn expired_cookies_are_removed() {
        let dir = TempDir::new("cookies").unwrap();
        let store = CookieFile::load(dir.path().join("cookies.json")).unwrap();
        let url = "https://civitai.com/";

        set(&store, url, &["session=abc"]);
        assert_eq!(store.len(), 1);

        set(&store, url, &["session=; Max-Age=0"]);
        assert!(store.is_empty());
        assert!(sent(&store, url).is_empty());

        set(&store, url, &["old=1; Expires=Wed, 21-Oct-2015 07:28:00 GMT"]);
        assert!(sent(&store, url).is_empty());
    }

    #[test]
    fn unreadable_file_starts_empty() {
        let dir = TempDir::new("cookies").unwrap();
        let path = dir.path().join("cookies.json");
        fs::write(&path, "not json").unwrap();

        assert!(CookieFile::load(&path).unwrap().is_empty());
    }
}
