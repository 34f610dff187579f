use combine::error::*;
use combine::parser::char::*;
use combine::parser::combinator::*;
use combine::stream::{easy, StreamErrorFor};
use combine::*;
use combine::{ParseError, Parser, Stream};
use std::net::IpAddr;
use std::str::FromStr;

use crate::crypto::Fingerprint;
use crate::id::Pt;
use crate::sdp::SdpError;

use super::data::*;

/// Run a value parser over the whole of `value`.
fn parse_all<'a, P>(p: P, value: &'a str) -> Result<P::Output, SdpError>
where
    P: Parser<easy::Stream<&'a str>>,
{
    (p, eof())
        .map(|(v, _)| v)
        .easy_parse(value)
        .map(|(v, _)| v)
        .map_err(|e| SdpError::Parse(e.to_string()))
}

pub(crate) fn session_attribute(name: &str, value: Option<&str>) -> SessionAttribute {
    let v = value.unwrap_or_default();

    let parsed = match name {
        "ice-ufrag" => Ok(SessionAttribute::IceUfrag(v.to_string())),
        "ice-pwd" => Ok(SessionAttribute::IcePwd(v.to_string())),
        "ice-lite" => Ok(SessionAttribute::IceLite),
        "ice-options" => Ok(SessionAttribute::IceOptions(v.to_string())),
        "fingerprint" => parse_all(fingerprint_value(), v).map(SessionAttribute::Fingerprint),
        "setup" => parse_all(setup_value(), v).map(SessionAttribute::Setup),
        ATTR_SINFO => Ok(SessionAttribute::SInfo(v.to_string())),
        ATTR_MAIL => Ok(SessionAttribute::Mail(v.to_string())),
        ATTR_GROUP_CHAT => Ok(SessionAttribute::GroupChat(v.to_string())),
        ATTR_DISPLAY_SIZE => Ok(SessionAttribute::DisplaySize(v.to_string())),
        _ => Err(SdpError::Parse(format!("unused attribute: {}", name))),
    };

    parsed.unwrap_or_else(|e| {
        trace!("Session attribute kept verbatim: {}", e);
        SessionAttribute::Unused {
            name: name.to_string(),
            value: value.map(|v| v.to_string()),
        }
    })
}

pub(crate) fn media_attribute(name: &str, value: Option<&str>) -> MediaAttribute {
    let v = value.unwrap_or_default();

    let parsed = match name {
        "ice-ufrag" => Ok(MediaAttribute::IceUfrag(v.to_string())),
        "ice-pwd" => Ok(MediaAttribute::IcePwd(v.to_string())),
        "candidate" => Ok(MediaAttribute::Candidate(v.to_string())),
        "fingerprint" => parse_all(fingerprint_value(), v).map(MediaAttribute::Fingerprint),
        "setup" => parse_all(setup_value(), v).map(MediaAttribute::Setup),
        "crypto" => parse_all(crypto_value(), v).map(MediaAttribute::Crypto),
        "sendrecv" => Ok(MediaAttribute::SendRecv),
        "sendonly" => Ok(MediaAttribute::SendOnly),
        "recvonly" => Ok(MediaAttribute::RecvOnly),
        "inactive" => Ok(MediaAttribute::Inactive),
        "rtcp" => parse_all(rtcp_value(), v).map(MediaAttribute::Rtcp),
        "ptime" => parse_all(ptime_value(), v).map(MediaAttribute::Ptime),
        "rtpmap" => parse_all(rtpmap_value(), v).map(|(pt, value)| MediaAttribute::RtpMap { pt, value }),
        "fmtp" => parse_all(fmtp_value(), v).map(|(pt, values)| MediaAttribute::Fmtp { pt, values }),
        "rtcp-fb" => parse_all(rtcp_fb_value(), v).map(|(pt, value)| MediaAttribute::RtcpFb { pt, value }),
        _ => Err(SdpError::Parse(format!("unused attribute: {}", name))),
    };

    parsed.unwrap_or_else(|e| {
        trace!("Media attribute kept verbatim: {}", e);
        MediaAttribute::Unused {
            name: name.to_string(),
            value: value.map(|v| v.to_string()),
        }
    })
}

/// `<width>:<height>`
pub(crate) fn display_size(v: &str) -> Result<(u32, u32), SdpError> {
    parse_all((number(), token(':'), number()).map(|(w, _, h)| (w, h)), v.trim())
}

/// The three bytes of an H.264 `profile-level-id`, as in `42e01f`.
pub(crate) fn profile_level_id(v: &str) -> Result<(u8, u8, u8), SdpError> {
    parse_all((hex_byte(), hex_byte(), hex_byte()), v)
}

// /////////////////////////////////////////////////// Attribute values

// sha-256 45:AD:5C:82:F8:BE:B5:2A:D1:74:A6:16:D0:50:CD:86
fn fingerprint_value<Input>() -> impl Parser<Input, Output = Fingerprint>
where
    Input: Stream<Token = char>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    (not_sp(), token(' '), sep_by1::<Vec<_>, _, _, _>(hex_byte(), token(':'))).map(|(hash_func, _, bytes)| {
        let hash_func: String = hash_func;
        Fingerprint {
            hash_func: hash_func.as_str().into(),
            bytes,
        }
    })
}

// actpass
fn setup_value<Input>() -> impl Parser<Input, Output = Setup>
where
    Input: Stream<Token = char>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    choice((
        attempt(string("actpass").map(|_| Setup::ActPass)),
        attempt(string("active").map(|_| Setup::Active)),
        attempt(string("passive").map(|_| Setup::Passive)),
        attempt(string("holdconn").map(|_| Setup::HoldConn)),
    ))
}

// 1 AES_CM_128_HMAC_SHA1_80 inline:PS1uQCVeeCFCanVmcjkpPywjNWhcYD0mXXtxaVBR|2^20|1:32 KDR=1
fn crypto_value<Input>() -> impl Parser<Input, Output = Crypto>
where
    Input: Stream<Token = char>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    let key_param = (
        many1::<String, _, _>(satisfy(|c| c != ':' && c != ';' && c != ' ')),
        token(':'),
        many1::<String, _, _>(satisfy(|c| c != ';' && c != ' ')),
    )
        .map(|(method, _, info)| KeyParam { method, info });

    (
        number(),
        token(' '),
        not_sp(),
        token(' '),
        sep_by1::<Vec<_>, _, _, _>(key_param, token(';')),
        many::<Vec<_>, _, _>(attempt((token(' '), not_sp())).map(|(_, s)| s)),
    )
        .map(|(tag, _, suite, _, key_params, session_params)| Crypto {
            tag,
            suite,
            key_params,
            session_params,
        })
}

// 53020
// 53020 IN IP4 126.16.64.4
fn rtcp_value<Input>() -> impl Parser<Input, Output = Rtcp>
where
    Input: Stream<Token = char>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    let addr = (
        string(" IN "),
        choice((attempt(string("IP4")), attempt(string("IP6")))),
        token(' '),
        not_sp().and_then(|s| {
            s.parse::<IpAddr>()
                .map_err(StreamErrorFor::<Input>::message_format)
        }),
    )
        .map(|(_, _, _, a)| a);

    (number(), optional(attempt(addr))).map(|(port, address)| Rtcp { port, address })
}

// 20
// 20.0
fn ptime_value<Input>() -> impl Parser<Input, Output = u32>
where
    Input: Stream<Token = char>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    (number(), optional((token('.'), many1::<String, _, _>(digit())))).map(|(v, _)| v)
}

// 97 H264/90000
// 0 PCMU/8000/1
fn rtpmap_value<Input>() -> impl Parser<Input, Output = (Pt, RtpMap)>
where
    Input: Stream<Token = char>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    (
        pt(),
        token(' '),
        many1::<String, _, _>(satisfy(|c| c != '/' && c != ' ')),
        token('/'),
        number(),
        optional((token('/'), number())),
    )
        .map(|(pt, _, encoding, _, clock_rate, channels)| {
            (
                pt,
                RtpMap {
                    encoding,
                    clock_rate,
                    channels: channels.map(|(_, c)| c),
                },
            )
        })
}

// 97 profile-level-id=42e01f;packetization-mode=1
// 97 profile-level-id=42e01f; packetization-mode=1
// 100 98/98/98
// 101 0-15
fn fmtp_value<Input>() -> impl Parser<Input, Output = (Pt, Vec<FormatParam>)>
where
    Input: Stream<Token = char>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    let params = sep_by1::<Vec<_>, _, _, _>(
        key_val().map(|(k, v)| FormatParam::parse(&k, &v)),
        (token(';'), optional(token(' '))),
    );

    let redundancy = sep_by1::<Vec<_>, _, _, _>(pt(), token('/')).map(|pts| vec![FormatParam::Redundancy(pts)]);

    let raw = any_value().map(|v| vec![FormatParam::Raw(v)]);

    (
        pt(),
        token(' '),
        choice((
            attempt(params.skip(eof())),
            attempt(redundancy.skip(eof())),
            raw,
        )),
    )
        .map(|(pt, _, values)| (pt, values))
}

// * ccm fir
// 97 nack pli
fn rtcp_fb_value<Input>() -> impl Parser<Input, Output = (Option<Pt>, FeedbackType)>
where
    Input: Stream<Token = char>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    (
        choice((token('*').map(|_| None), pt().map(Some))),
        token(' '),
        any_value(),
    )
        .map(|(pt, _, v)| (pt, FeedbackType::from(v.as_str())))
}

// /////////////////////////////////////////////////// Generic things below

fn pt<Input>() -> impl Parser<Input, Output = Pt>
where
    Input: Stream<Token = char>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    number::<Input, u8>().map(Pt::from)
}

/// Decimal digits into any number type.
fn number<Input, T>() -> impl Parser<Input, Output = T>
where
    Input: Stream<Token = char>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    many1::<String, _, _>(digit()).and_then(|s| {
        s.parse::<T>()
            .map_err(StreamErrorFor::<Input>::message_format)
    })
}

fn hex_byte<Input>() -> impl Parser<Input, Output = u8>
where
    Input: Stream<Token = char>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    count_min_max(2, 2, hex_digit()).and_then(|x: String| {
        u8::from_str_radix(&x, 16).map_err(StreamErrorFor::<Input>::message_format)
    })
}

/// Not SP, \r or \n
fn not_sp<Input>() -> impl Parser<Input, Output = String>
where
    Input: Stream<Token = char>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    many1(satisfy(|c| c != ' ' && c != '\r' && c != '\n'))
}

/// Any value that isn't \r or \n.
fn any_value<Input>() -> impl Parser<Input, Output = String>
where
    Input: Stream<Token = char>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    many1(satisfy(|c| c != '\r' && c != '\n'))
}

// packetization-mode=1
fn key_val<Input>() -> impl Parser<Input, Output = (String, String)>
where
    Input: Stream<Token = char>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    (
        many1(satisfy(|c| c != '=' && c != ';' && c != ' ' && c != '\r' && c != '\n')),
        token('='),
        many1(satisfy(|c| c != ';' && c != ' ' && c != '\r' && c != '\n')),
    )
        .map(|(key, _, val)| (key, val))
}
