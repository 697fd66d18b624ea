//! # Error Responses to the Client
//!
//! Builds the small `text/html` error page the original's `clienterror`
//! writes for unimplemented methods/schemes and structural parse failures,
//! preserved verbatim in wording and structure.

use std::io::Write;

/// Writes an HTTP/1.0 error response with an HTML body to `out`.
pub fn client_error<W: Write>(
    out: &mut W,
    errnum: &str,
    shortmsg: &str,
    longmsg: &str,
) -> std::io::Result<()> {
    let body = format!(
        "<!DOCTYPE html>\r\n\
<html>\r\n\
<head><title>Proxy Error</title></head>\r\n\
<body bgcolor=\"ffffff\">\r\n\
<h1>{errnum}: {shortmsg}</h1>\r\n\
<p>{longmsg}</p>\r\n\
<hr /><em>Proxy</em>\r\n\
</body></html>\r\n"
    );

    let headers = format!(
        "HTTP/1.0 {errnum} {shortmsg}\r\n\
Content-Type: text/html\r\n\
Content-Length: {}\r\n\r\n",
        body.len()
    );

    out.write_all(headers.as_bytes())?;
    out.write_all(body.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_status_line_and_html_body() {
        let mut buf = Vec::new();
        client_error(&mut buf, "501", "Not Implemented", "Proxy does not implement POST").unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("HTTP/1.0 501 Not Implemented\r\n"));
        assert!(text.contains("Content-Type: text/html\r\n"));
        assert!(text.contains("<h1>501: Not Implemented</h1>"));
        assert!(text.contains("Proxy does not implement POST"));
    }
}
