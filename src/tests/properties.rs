//! Randomized round-trip checks over the codecs and header machinery.

use crate::codec::{ReadBuf, WriteBuf};
use crate::cookie::{parse_set_cookie_value, Cookie};
use crate::headers::{format_http_date, parse_http_date, RequestHeaders};
use crate::query;
use percent_encoding::{percent_encode, NON_ALPHANUMERIC};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn rng() -> StdRng {
    StdRng::seed_from_u64(0x6c6f6e67686f7573)
}

fn random_token(rng: &mut StdRng, max_len: usize) -> String {
    let alphabet = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_";
    let len = rng.gen_range(1, max_len + 1);
    (0..len)
        .map(|_| alphabet[rng.gen_range(0, alphabet.len())] as char)
        .collect()
}

fn random_text(rng: &mut StdRng, max_len: usize) -> String {
    let alphabet = "abcXYZ 0189 æøå '\"=;,+%/-";
    let chars: Vec<char> = alphabet.chars().collect();
    let len = rng.gen_range(0, max_len + 1);
    (0..len).map(|_| chars[rng.gen_range(0, chars.len())]).collect()
}

#[test]
fn codec_scalars_round_trip_randomly() {
    let mut rng = rng();

    for _ in 0..200 {
        let a: u64 = rng.gen();
        let b: i64 = rng.gen();
        let c: u32 = rng.gen();
        let d: i16 = rng.gen();
        let e: f64 = rng.gen();
        let flag: bool = rng.gen();
        let text = random_token(&mut rng, 40);

        let mut wb = WriteBuf::new(16, true);
        wb.write_uint64(a).unwrap();
        wb.write_int64(b).unwrap();
        wb.write_uint32(c).unwrap();
        wb.write_int16(d).unwrap();
        wb.write_double(e).unwrap();
        wb.write_bool(flag).unwrap();
        wb.write_string(&text).unwrap();

        let mut rb = ReadBuf::new(wb.as_slice());
        assert_eq!(rb.read_uint64().unwrap(), a);
        assert_eq!(rb.read_int64().unwrap(), b);
        assert_eq!(rb.read_uint32().unwrap(), c);
        assert_eq!(rb.read_int16().unwrap(), d);
        assert_eq!(rb.read_double().unwrap(), e);
        assert_eq!(rb.read_bool().unwrap(), flag);
        assert_eq!(rb.read_string(64).unwrap(), text);
        assert_eq!(rb.remaining(), 0);
    }
}

#[test]
fn cookies_round_trip_randomly() {
    let mut rng = rng();

    for _ in 0..200 {
        let mut cookie = Cookie::new(&random_token(&mut rng, 16), &random_text(&mut rng, 24));
        if rng.gen() {
            cookie.domain = Some(random_token(&mut rng, 12));
        }
        if rng.gen() {
            cookie.path = Some(format!("/{}", random_token(&mut rng, 12)));
        }
        if rng.gen() {
            cookie.comment = Some(random_token(&mut rng, 12));
        }
        if rng.gen() {
            cookie.max_age = Some(rng.gen_range(0, 1_000_000));
        }
        cookie.secure = rng.gen();

        let parsed = parse_set_cookie_value(&cookie.header_value()).unwrap();
        assert_eq!(parsed, cookie, "emitted: {}", cookie.header_value());
    }
}

#[test]
fn uri_params_round_trip_randomly() {
    let mut rng = rng();

    for _ in 0..200 {
        let name = random_token(&mut rng, 12);
        let value = random_text(&mut rng, 24);

        let encoded = percent_encode(value.as_bytes(), NON_ALPHANUMERIC).to_string();
        let query = format!("{}={}", name, encoded);
        let params = query::parse_uri_params(&query).unwrap();

        assert_eq!(params.len(), 1);
        assert_eq!(params[0].0, name);
        assert_eq!(params[0].1, value);
    }
}

#[test]
fn form_values_round_trip_randomly() {
    let mut rng = rng();

    for _ in 0..200 {
        let value = random_text(&mut rng, 24);
        let encoded = percent_encode(value.as_bytes(), NON_ALPHANUMERIC).to_string();
        assert_eq!(query::decode_form_value(encoded.as_bytes()).unwrap(), value);
    }
}

#[test]
fn header_setters_echo_their_getters() {
    let mut rng = rng();

    for _ in 0..100 {
        let mut headers = RequestHeaders::default();
        let host = random_token(&mut rng, 20);
        let agent = random_text(&mut rng, 20);
        let forwards: u64 = rng.gen_range(0, 256);

        headers.set_host(&host);
        headers.set_user_agent(&agent);
        headers.set_max_forwards(forwards);

        assert_eq!(headers.host(), Some(host.as_str()));
        assert_eq!(headers.user_agent(), Some(agent.as_str()));
        assert_eq!(headers.max_forwards(), Some(forwards));
    }
}

#[test]
fn dates_survive_formatting() {
    let mut rng = rng();

    for _ in 0..200 {
        let secs: i64 = rng.gen_range(0, 4_000_000_000);
        let time = chrono::DateTime::<chrono::Utc>::from_utc(
            chrono::NaiveDateTime::from_timestamp(secs, 0),
            chrono::Utc,
        );

        let formatted = format_http_date(&time);
        assert_eq!(formatted.len(), 29);
        assert_eq!(parse_http_date(&formatted).unwrap(), time);
    }
}
