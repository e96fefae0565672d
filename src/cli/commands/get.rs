//! Raw authenticated GET.

use super::{print_json, Context};
use crate::cli::InstanceArgs;
use crate::client::RawResponse;
use crate::error::{Error, Result};

/// `dclient get PATH`
///
/// JSON responses are pretty-printed; anything else is printed as-is.
///
/// # Errors
///
/// Returns an error for any status other than 200.
pub fn execute(path: &str, conn: &InstanceArgs, ctx: &Context) -> Result<()> {
    let (client, _) = ctx.instance_client(conn)?;
    let path = format!("/{}", path.trim_start_matches('/'));
    let response = client.get_raw(&path)?;
    print_response(&response, &client.url(&path))
}

fn print_response(response: &RawResponse, url: &str) -> Result<()> {
    if response.status != 200 {
        return Err(Error::Other(format!("{} error for {url}", response.status)));
    }
    if response.is_json() {
        print_json(&response.json()?)
    } else {
        println!("{}", response.body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, content_type: &str, body: &str) -> RawResponse {
        RawResponse {
            status,
            content_type: Some(content_type.to_string()),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_non_200_names_url() {
        let err = print_response(
            &response(404, "text/html", "nope"),
            "https://example.com/missing",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "404 error for https://example.com/missing");
    }

    #[test]
    fn test_json_and_text_bodies_print() {
        print_response(&response(200, "application/json", "{\"a\": 1}"), "u").unwrap();
        print_response(&response(200, "text/plain", "hello"), "u").unwrap();
    }
}
