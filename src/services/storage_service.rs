// src/services/storage_service.rs

use std::path::PathBuf;
use uuid::Uuid;

// Armazenamento de ficheiros com degradação explícita: se a escrita
// falhar, devolvemos a URI de placeholder em vez de erro — o mesmo
// contrato do resto do modo degradado (a experiência continua, o dado
// não é durável). O prefixo é parte do contrato com o frontend.
pub const FILE_PLACEHOLDER_SCHEME: &str = "file-placeholder://";

#[derive(Clone)]
pub struct StorageService {
    upload_dir: PathBuf,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    // URL pública ("/uploads/...") ou placeholder ("file-placeholder://...")
    pub url: String,
    pub name: String,
    pub size: i64,
    pub degraded: bool,
}

impl StorageService {
    pub fn new(upload_dir: PathBuf) -> Self {
        Self { upload_dir }
    }

    pub async fn store(&self, name: &str, bytes: &[u8]) -> StoredFile {
        let sanitized = sanitize_file_name(name);
        // Prefixo aleatório: dois uploads com o mesmo nome não colidem
        let stored_name = format!("{}-{}", Uuid::new_v4().simple(), sanitized);

        let result: std::io::Result<()> = async {
            tokio::fs::create_dir_all(&self.upload_dir).await?;
            tokio::fs::write(self.upload_dir.join(&stored_name), bytes).await
        }
        .await;

        match result {
            Ok(()) => StoredFile {
                url: format!("/uploads/{stored_name}"),
                name: sanitized,
                size: bytes.len() as i64,
                degraded: false,
            },
            Err(e) => {
                tracing::warn!("Upload de '{sanitized}' rejeitado pelo storage: {e}");
                StoredFile {
                    url: format!("{FILE_PLACEHOLDER_SCHEME}{sanitized}"),
                    name: sanitized,
                    size: bytes.len() as i64,
                    degraded: true,
                }
            }
        }
    }
}

// Mantém só o nome-base e troca qualquer caractere suspeito
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "arquivo".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_file_name("escala janeiro.pdf"), "escala_janeiro.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name(""), "arquivo");
    }

    #[tokio::test]
    async fn unwritable_dir_degrades_to_placeholder() {
        // /dev/null/x nunca é um diretório válido
        let service = StorageService::new(PathBuf::from("/dev/null/x"));
        let stored = service.store("laudo.pdf", b"conteudo").await;

        assert!(stored.degraded);
        assert_eq!(stored.url, format!("{FILE_PLACEHOLDER_SCHEME}laudo.pdf"));
        assert_eq!(stored.size, 8);
    }

    #[tokio::test]
    async fn successful_upload_returns_public_url() {
        let dir = std::env::temp_dir().join(format!("uploads-teste-{}", Uuid::new_v4()));
        let service = StorageService::new(dir.clone());
        let stored = service.store("escala.pdf", b"abc").await;

        assert!(!stored.degraded);
        assert!(stored.url.starts_with("/uploads/"));
        assert!(stored.url.ends_with("-escala.pdf"));

        let _ = tokio::fs::remove_dir_all(dir).await;
    }
}
