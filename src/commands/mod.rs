pub mod pull;
pub mod share;

/// Browser link for an uploaded folder, printed at the end of a run.
pub fn folder_link(folder_id: &str) -> String {
    format!("https://drive.google.com/drive/folders/{}", folder_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_link_test() {
        assert_eq!(
            folder_link("abc123"),
            "https://drive.google.com/drive/folders/abc123"
        );
    }
}
