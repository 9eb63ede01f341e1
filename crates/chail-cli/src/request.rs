//! Builds the immutable request specs handed to the engine

use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use chail_engine::RequestSpec;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::Method;

use crate::args::Cli;
use crate::form::MultipartForm;

/// Split a `Key: value` header line
pub fn parse_header(line: &str) -> Result<(String, String)> {
    let (key, value) = line
        .split_once(':')
        .ok_or_else(|| anyhow!("invalid header string {:?}", line))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("invalid header string {:?}", line));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// `-d` payload: literal text, or file contents when prefixed with `@`
pub fn load_data(arg: &str) -> Result<Bytes> {
    match arg.strip_prefix('@') {
        Some(path) => {
            let contents =
                std::fs::read(path).with_context(|| format!("reading data file {}", path))?;
            Ok(Bytes::from(contents))
        }
        None => Ok(Bytes::copy_from_slice(arg.as_bytes())),
    }
}

/// One spec per target URL, sharing method, headers and body
pub fn build_specs(cli: &Cli) -> Result<Vec<RequestSpec>> {
    let form = MultipartForm::parse(&cli.form)?;

    let mut body = Bytes::new();
    let mut form_content_type = None;
    if let Some(data) = &cli.data {
        body = load_data(data)?;
    } else if !form.is_empty() {
        let boundary = MultipartForm::random_boundary();
        body = form.encode(&boundary)?;
        form_content_type = Some(MultipartForm::content_type(&boundary));
    }

    // A payload always goes out as POST
    let method = if cli.data.is_some() || !form.is_empty() {
        Method::POST
    } else {
        Method::from_bytes(cli.method.to_ascii_uppercase().as_bytes())
            .with_context(|| format!("invalid method string {:?}", cli.method))?
    };

    let (first, rest) = cli
        .urls
        .split_first()
        .ok_or_else(|| anyhow!("Missing URL!"))?;

    let mut template = RequestSpec::new(method, first, HeaderMap::new(), body)
        .with_context(|| format!("invalid target {:?}", first))?;
    for line in &cli.headers {
        let (key, value) = parse_header(line)?;
        template.append_header(&key, &value)?;
    }
    if let Some(content_type) = form_content_type {
        if !template.headers().contains_key(CONTENT_TYPE) {
            template.append_header(CONTENT_TYPE.as_str(), &content_type)?;
        }
    }

    let mut specs = Vec::with_capacity(cli.urls.len());
    for url in rest {
        specs.push(
            template
                .with_url(url)
                .with_context(|| format!("invalid target {:?}", url))?,
        );
    }
    specs.insert(0, template);
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("chail").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("Content-Type: application/json").unwrap(),
            ("Content-Type".to_string(), "application/json".to_string())
        );
        assert_eq!(
            parse_header("X-Time: 12:30").unwrap(),
            ("X-Time".to_string(), "12:30".to_string())
        );
        assert!(parse_header("no separator").is_err());
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn test_load_data() {
        assert_eq!(load_data("key=value").unwrap(), Bytes::from_static(b"key=value"));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{\"k\":1}").unwrap();
        let arg = format!("@{}", file.path().display());
        assert_eq!(load_data(&arg).unwrap(), Bytes::from_static(b"{\"k\":1}"));

        assert!(load_data("@/nonexistent/data.json").is_err());
    }

    #[test]
    fn test_plain_get() {
        let specs = build_specs(&cli(&["http://localhost:8080/status"])).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].method(), &Method::GET);
        assert!(specs[0].body().is_empty());
    }

    #[test]
    fn test_data_forces_post() {
        let specs = build_specs(&cli(&[
            "-X",
            "GET",
            "-H",
            "Content-Type: application/json",
            "-d",
            r#"{"key1":"value1"}"#,
            "http://localhost",
        ]))
        .unwrap();

        assert_eq!(specs[0].method(), &Method::POST);
        assert_eq!(specs[0].body(), &Bytes::from_static(br#"{"key1":"value1"}"#));
        assert_eq!(
            specs[0].headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_custom_method_and_repeated_headers() {
        let specs = build_specs(&cli(&[
            "-X",
            "put",
            "-H",
            "Accept: text/plain",
            "-H",
            "accept: text/html",
            "http://localhost",
        ]))
        .unwrap();

        assert_eq!(specs[0].method(), &Method::PUT);
        assert_eq!(specs[0].headers().get_all("accept").iter().count(), 2);
    }

    #[test]
    fn test_form_sets_multipart_content_type() {
        let specs = build_specs(&cli(&["-F", "name=value", "http://localhost"])).unwrap();

        assert_eq!(specs[0].method(), &Method::POST);
        let content_type = specs[0].headers().get(CONTENT_TYPE).unwrap().to_str().unwrap();
        let boundary = content_type
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap();
        let body = String::from_utf8(specs[0].body().to_vec()).unwrap();
        assert!(body.starts_with(&format!("--{}\r\n", boundary)));
        assert!(body.ends_with(&format!("--{}--\r\n", boundary)));
    }

    #[test]
    fn test_one_spec_per_target() {
        let specs = build_specs(&cli(&[
            "-H",
            "X-Probe: 1",
            "http://a.example/one",
            "https://b.example/two",
        ]))
        .unwrap();

        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].url().host_str(), Some("a.example"));
        assert_eq!(specs[1].url().host_str(), Some("b.example"));
        assert_eq!(specs[1].headers().get("x-probe").unwrap(), "1");
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(build_specs(&cli(&["-H", "broken", "http://localhost"])).is_err());
        assert!(build_specs(&cli(&["not-a-url"])).is_err());
        assert!(build_specs(&cli(&["-X", "BAD METHOD", "http://localhost"])).is_err());
    }
}
