//! DRM detection for EPUBs, and removal through an external tool.

use crate::config::Config;
use crate::epub::EpubArchive;
use crate::tools::{CommandConverter, ExternalConverter};
use crate::{xml, EbookError, Result};
use std::fmt;
use std::path::{Path, PathBuf};

const ENCRYPTION_XML: &str = "META-INF/encryption.xml";
const RIGHTS_XML: &str = "META-INF/rights.xml";
const LICENSE_LCPL: &str = "META-INF/license.lcpl";
const SINF_XML: &str = "META-INF/sinf.xml";

/// Output file name used by the DRM removal tool.
pub const DECRYPTED_NAME: &str = "post_dedrm.epub";

// ── Encryption ────────────────────────────────────────────────────────────────

/// DRM scheme protecting a book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encryption {
    Unencrypted,
    /// Adobe ADEPT with an RSA-wrapped key.
    Adobe,
    /// Adobe ADEPT with a longer, AES-era key.
    AdobeAes,
    BarnesNoble,
    Kobo,
    ReadiumLcp,
    /// Apple FairPlay.
    Apple,
    Unknown(String),
}

impl Encryption {
    pub fn is_encrypted(&self) -> bool {
        !matches!(self, Self::Unencrypted)
    }

    /// Schemes the configured Adobe key files can unlock.
    pub fn is_adobe(&self) -> bool {
        matches!(self, Self::Adobe | Self::AdobeAes)
    }
}

impl fmt::Display for Encryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unencrypted => f.write_str("Unencrypted"),
            Self::Adobe => f.write_str("Adobe"),
            Self::AdobeAes => f.write_str("Adobe (AES)"),
            Self::BarnesNoble => f.write_str("B&N"),
            Self::Kobo => f.write_str("Kobo"),
            Self::ReadiumLcp => f.write_str("Readium LCP"),
            Self::Apple => f.write_str("Apple"),
            Self::Unknown(detail) => write!(f, "Unknown ({detail})"),
        }
    }
}

// ── Detection ─────────────────────────────────────────────────────────────────

/// Classifies the DRM scheme of a book file.
pub trait DrmDetector {
    fn detect(&self, path: &Path) -> Result<Encryption>;
}

/// Detects EPUB DRM from the files the vendors add under `META-INF/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpubDrmDetector;

impl DrmDetector for EpubDrmDetector {
    fn detect(&self, path: &Path) -> Result<Encryption> {
        let bytes = std::fs::read(path)?;
        self.detect_bytes(&bytes, path)
    }
}

impl EpubDrmDetector {
    pub fn detect_bytes(&self, bytes: &[u8], path: &Path) -> Result<Encryption> {
        let archive = EpubArchive::open(bytes).map_err(|e| EbookError::DetectEncryption {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(classify(&archive))
    }
}

fn classify(archive: &EpubArchive) -> Encryption {
    let contains_text = |name: &str, needle: &[u8]| {
        archive
            .entry(name)
            .is_some_and(|data| data.windows(needle.len()).any(|w| w == needle))
    };

    if archive.contains(LICENSE_LCPL) && contains_text(ENCRYPTION_XML, b"EncryptedContentKey") {
        return Encryption::ReadiumLcp;
    }
    if contains_text(SINF_XML, b"fairplay") {
        return Encryption::Apple;
    }
    if !archive.contains(RIGHTS_XML) || !archive.contains(ENCRYPTION_XML) {
        return Encryption::Unencrypted;
    }

    let rights = match archive.read_text(RIGHTS_XML).ok().flatten().map(|t| xml::parse(&t)) {
        Some(Ok(rights)) => rights,
        _ => return Encryption::Unknown("unreadable rights.xml".into()),
    };
    if rights.find_descendant("kdrm").is_some() {
        return Encryption::Kobo;
    }

    let key_len = rights
        .find_descendant("encryptedKey")
        .map(|key| key.text.chars().filter(|c| !c.is_whitespace()).count());
    match key_len {
        Some(172) => Encryption::Adobe,
        Some(n) if n > 172 => Encryption::AdobeAes,
        Some(64) => Encryption::BarnesNoble,
        Some(n) => Encryption::Unknown(format!("key length {n}")),
        None => Encryption::Unknown("no encryptedKey in rights.xml".into()),
    }
}

// ── Removal ───────────────────────────────────────────────────────────────────

/// Decrypt `input` into `out_dir` with the DRM tool configured in `config`.
///
/// Returns `Ok(None)` when the book is not encrypted. Adobe-protected books
/// are tried with every configured key file in order; other schemes are
/// rejected with [`EbookError::UnsupportedEncryption`].
pub fn remove_drm(
    input: &Path,
    encryption: &Encryption,
    config: &Config,
    out_dir: &Path,
) -> Result<Option<PathBuf>> {
    if !encryption.is_encrypted() {
        log::debug!("Skipping {} because it's already unencrypted.", input.display());
        return Ok(None);
    }
    if !encryption.is_adobe() {
        return Err(EbookError::UnsupportedEncryption {
            path: input.to_path_buf(),
            encryption: encryption.to_string(),
        });
    }

    let missing_key = |message: String| EbookError::MissingDrmKeyFile {
        path: input.to_path_buf(),
        scheme: encryption.to_string(),
        message,
    };

    if config.adobe_key_files.is_empty() {
        return Err(missing_key("add adobe_key_files to your config file".into()));
    }
    if let Some(absent) = config.adobe_key_files.iter().find(|key| !key.exists()) {
        return Err(missing_key(format!("key file {} not found", absent.display())));
    }

    let template = config.dedrm_command.as_deref().unwrap_or_default();
    let converter = CommandConverter::from_template(template, DECRYPTED_NAME).ok_or_else(|| {
        EbookError::RemoveDrm {
            path: input.to_path_buf(),
            message: "no dedrm_command configured".into(),
        }
    })?;

    for key in &config.adobe_key_files {
        match converter.clone().with_key(key).run(input, out_dir) {
            Ok(output) => {
                log::info!("Decrypted {} with key file {}", input.display(), key.display());
                return Ok(Some(output));
            }
            Err(e) => log::debug!("Key file {} did not work: {e}", key.display()),
        }
    }

    Err(EbookError::RemoveDrm {
        path: input.to_path_buf(),
        message: "no valid key file found".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive(entries: &[(&str, &str)]) -> EpubArchive {
        EpubArchive::from_entries(entries.iter().map(|(k, v)| (*k, v.as_bytes().to_vec())))
    }

    fn rights_with_key(len: usize) -> String {
        format!(
            r#"<adept:rights xmlns:adept="http://ns.adobe.com/adept"><adept:licenseToken><adept:encryptedKey>{}</adept:encryptedKey></adept:licenseToken></adept:rights>"#,
            "A".repeat(len)
        )
    }

    #[test]
    fn plain_epub_is_unencrypted() {
        assert_eq!(classify(&archive(&[("mimetype", "application/epub+zip")])), Encryption::Unencrypted);
        // font obfuscation alone ships encryption.xml without rights.xml
        assert_eq!(classify(&archive(&[(ENCRYPTION_XML, "<encryption/>")])), Encryption::Unencrypted);
    }

    #[test]
    fn adobe_key_lengths() {
        for (len, expected) in [
            (172, Encryption::Adobe),
            (200, Encryption::AdobeAes),
            (64, Encryption::BarnesNoble),
            (10, Encryption::Unknown("key length 10".into())),
        ] {
            let rights = rights_with_key(len);
            let found = classify(&archive(&[(ENCRYPTION_XML, "<encryption/>"), (RIGHTS_XML, rights.as_str())]));
            assert_eq!(found, expected, "key length {len}");
        }
    }

    #[test]
    fn vendor_markers() {
        let lcp = archive(&[
            (ENCRYPTION_XML, "<encryption><EncryptedContentKey/></encryption>"),
            (LICENSE_LCPL, "{}"),
        ]);
        assert_eq!(classify(&lcp), Encryption::ReadiumLcp);

        let apple = archive(&[(SINF_XML, "<fairplay:sinf/>")]);
        assert_eq!(classify(&apple), Encryption::Apple);

        let kobo = archive(&[
            (ENCRYPTION_XML, "<encryption/>"),
            (RIGHTS_XML, "<rights><kdrm><k>1</k></kdrm></rights>"),
        ]);
        assert_eq!(classify(&kobo), Encryption::Kobo);
    }

    #[test]
    fn detection_of_non_zip_fails() {
        let err = EpubDrmDetector
            .detect_bytes(b"nope", Path::new("x.epub"))
            .unwrap_err();
        assert!(matches!(err, EbookError::DetectEncryption { .. }));
    }

    #[test]
    fn removal_rules() {
        let dir = tempfile::tempdir().unwrap();
        let input = Path::new("book.epub");
        let config = Config::default();

        assert!(remove_drm(input, &Encryption::Unencrypted, &config, dir.path())
            .unwrap()
            .is_none());
        assert!(matches!(
            remove_drm(input, &Encryption::Kobo, &config, dir.path()),
            Err(EbookError::UnsupportedEncryption { .. })
        ));
        assert!(matches!(
            remove_drm(input, &Encryption::Adobe, &config, dir.path()),
            Err(EbookError::MissingDrmKeyFile { .. })
        ));

        let config = Config {
            adobe_key_files: vec![dir.path().join("absent.der")],
            ..Default::default()
        };
        assert!(matches!(
            remove_drm(input, &Encryption::Adobe, &config, dir.path()),
            Err(EbookError::MissingDrmKeyFile { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn removal_runs_configured_command() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("book.epub");
        let key = dir.path().join("adobe.der");
        std::fs::write(&input, b"epub").unwrap();
        std::fs::write(&key, b"key").unwrap();

        let config = Config {
            adobe_key_files: vec![key],
            dedrm_command: Some(vec!["cp".into(), "{input}".into(), "{output}".into()]),
            ..Default::default()
        };
        let output = remove_drm(&input, &Encryption::Adobe, &config, dir.path())
            .unwrap()
            .unwrap();
        assert_eq!(output, dir.path().join(DECRYPTED_NAME));
    }
}
