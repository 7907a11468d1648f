use axum::http::StatusCode;
use humansize::{format_size, BINARY};
use maud::{html, Markup, PreEscaped, DOCTYPE};

use crate::{
    listing::{DirectoryEntry, Listing},
    upload::{StoredUpload, UploadError},
};

const STYLE: &str = r#"
body { font-family: Arial, sans-serif; margin: 0; padding: 0; background-color: #F2F2F2; }
.container { max-width: 800px; margin: 0 auto; padding: 20px; background-color: #FFF; box-shadow: 0 0 10px rgba(0, 0, 0, 0.3); }
h1 { text-align: center; margin-bottom: 20px; }
form { display: flex; flex-direction: column; align-items: center; margin-bottom: 20px; }
input[type="file"] { margin-bottom: 10px; }
input[type="submit"] { background-color: #4CAF50; color: #FFF; padding: 10px; border: none; border-radius: 5px; cursor: pointer; }
input[type="submit"]:hover { background-color: #3E8E41; }
table { border-collapse: collapse; width: 100%; margin-bottom: 20px; }
th, td { padding: 10px; text-align: left; border-bottom: 1px solid #ddd; }
th { background-color: #4CAF50; color: #FFF; }
a { color: #000; text-decoration: none; }
a:hover { text-decoration: underline; }
.failed { color: #B00020; }
"#;

fn page(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (PreEscaped(STYLE)) }
            }
            body {
                div class="container" { (content) }
            }
        }
    }
}

/// Directory listing with the upload and search forms on top. Without `upload_action`
/// the upload form posts back to the listed directory.
pub fn listing_page(
    display_path: &str,
    listing: &Listing,
    upload_action: Option<&str>,
) -> Markup {
    page(
        &format!("Directory listing for {display_path}"),
        html! {
            h1 { "Upload File" }
            form enctype="multipart/form-data" method="post" action=[upload_action] {
                input name="file" type="file";
                input type="submit" value="Upload File";
            }
            form action="/search" method="get" {
                label for="search" { "Search:" }
                input type="search" id="search" name="q" placeholder="Search...";
                button type="submit" { "Go" }
            }
            hr;
            h2 { "Directories:" }
            (entry_table(&listing.dirs))
            hr;
            h2 { "Files:" }
            (entry_table(&listing.files))
        },
    )
}

fn entry_table(entries: &[DirectoryEntry]) -> Markup {
    html! {
        table {
            tr {
                th { "Name" }
                th { "Size" }
                th { "Last Modified" }
            }
            @for entry in entries {
                tr {
                    td { a href=(entry.href()) { (entry.display_name()) } }
                    td {
                        @if entry.leads_to_dir { "-" } @else { (format_size(entry.size, BINARY)) }
                    }
                    td {
                        @if let Some(modified) = entry.modified_at {
                            (modified.format("%Y-%m-%d %H:%M:%S"))
                        }
                    }
                }
            }
        }
    }
}

pub fn upload_result_page(outcome: Result<&StoredUpload, &UploadError>) -> Markup {
    page(
        "Upload Result Page",
        html! {
            h2 { "Upload Result Page" }
            hr;
            @match outcome {
                Ok(stored) => {
                    strong { "Success: " }
                    "File '" (stored.file_name) "' upload success!"
                }
                Err(err) => {
                    strong class="failed" { "Failed: " }
                    (err)
                }
            }
            br;
            a href="." { "back" }
        },
    )
}

pub fn error_page(status: StatusCode, message: &str) -> Markup {
    let reason = status.canonical_reason().unwrap_or("Error");
    page(
        &format!("Error {}", status.as_u16()),
        html! {
            h1 { "Error " (status.as_u16()) " " (reason) }
            p { (message) }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::EntryKind;
    use std::path::PathBuf;

    fn entry(name: &str, kind: EntryKind, leads_to_dir: bool) -> DirectoryEntry {
        DirectoryEntry {
            name: name.to_string(),
            kind,
            size: 2048,
            modified_at: None,
            leads_to_dir,
        }
    }

    #[test]
    fn listing_escapes_names_and_encodes_links() {
        let listing = Listing {
            dirs: vec![entry("photos", EntryKind::Directory, true)],
            files: vec![entry("<b>&.txt", EntryKind::File, false)],
        };

        let html = listing_page("/", &listing, None).into_string();

        assert!(html.contains("Directory listing for /"));
        assert!(html.contains(r#"href="photos/""#));
        assert!(html.contains("photos/</a>"));
        assert!(html.contains("&lt;b&gt;&amp;.txt"));
        assert!(html.contains("%3Cb%3E%26.txt"));
        assert!(html.contains("2 KiB"));
        assert!(!html.contains("action=\"/\""));
    }

    #[test]
    fn upload_form_can_target_another_directory() {
        let html = listing_page("/search?q=a", &Listing::default(), Some("/")).into_string();
        assert!(html.contains(r#"method="post" action="/""#));
    }

    #[test]
    fn upload_result_reports_both_outcomes() {
        let stored = StoredUpload {
            path: PathBuf::from("/srv/up/note.txt"),
            file_name: "note.txt".to_string(),
            bytes_written: 2,
        };
        let html = upload_result_page(Ok(&stored)).into_string();
        assert!(html.contains("Success"));
        assert!(html.contains("note.txt"));
        assert!(!html.contains("/srv/up"));

        let html = upload_result_page(Err(&UploadError::TruncatedBody)).into_string();
        assert!(html.contains("Failed"));
        assert!(html.contains("unexpected end of data"));
    }
}
