//! Splits a request target (an absolute URL as received on the wire)
//! into host, optional port, and path, mirroring `parse_uri` in the
//! pthreads reference proxy this crate descends from.

/// `host`, `port` (absent ⇒ 80), `path` (empty ⇒ forward `/`).
#[derive(Debug, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
}

pub fn parse_target(target: &str) -> Target {
    let after_scheme = match target.find("//") {
        Some(idx) => &target[idx + 2..],
        None => target,
    };

    let colon = after_scheme.find(':');
    let slash = after_scheme.find('/');

    let (host_end, port, path_start) = match (colon, slash) {
        (Some(c), slash) if slash.map_or(true, |s| c < s) => {
            let digits_start = c + 1;
            let digits_end = after_scheme[digits_start..]
                .find(|ch: char| !ch.is_ascii_digit())
                .map(|o| digits_start + o)
                .unwrap_or(after_scheme.len());
            let port = after_scheme[digits_start..digits_end].parse::<u16>().ok();
            (c, port, digits_end)
        }
        (_, Some(s)) => (s, None, s),
        (_, None) => (after_scheme.len(), None, after_scheme.len()),
    };

    let host = after_scheme[..host_end].to_string();
    let path = if path_start >= after_scheme.len() {
        "/".to_string()
    } else {
        after_scheme[path_start..].to_string()
    };

    Target { host, port, path }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_url_with_scheme_and_path() {
        let t = parse_target("http://example.com/hub/index.html");
        assert_eq!(t.host, "example.com");
        assert_eq!(t.port, None);
        assert_eq!(t.path, "/hub/index.html");
    }

    #[test]
    fn with_explicit_port() {
        let t = parse_target("http://example.com:8080/p");
        assert_eq!(t.host, "example.com");
        assert_eq!(t.port, Some(8080));
        assert_eq!(t.path, "/p");
    }

    #[test]
    fn no_scheme_prefix() {
        let t = parse_target("example.com/p");
        assert_eq!(t.host, "example.com");
        assert_eq!(t.port, None);
        assert_eq!(t.path, "/p");
    }

    #[test]
    fn no_path_forwards_root() {
        let t = parse_target("http://example.com");
        assert_eq!(t.host, "example.com");
        assert_eq!(t.port, None);
        assert_eq!(t.path, "/");
    }

    #[test]
    fn no_colon_no_slash_defaults_to_root_path() {
        // The open edge case from the reference source: dereferencing an
        // absent path pointer. Treated as path "/" per spec.
        let t = parse_target("http://example.com");
        assert_eq!(t.path, "/");
    }

    #[test]
    fn port_stops_at_first_non_digit() {
        let t = parse_target("http://example.com:8080extra/p");
        assert_eq!(t.host, "example.com");
        assert_eq!(t.port, Some(8080));
        assert_eq!(t.path, "extra/p");
    }

    #[test]
    fn empty_path_after_host_forwards_root() {
        let t = parse_target("http://example.com:80");
        assert_eq!(t.path, "/");
    }
}
