use sdpneg::crypto::{DtlsContext, KeyExchangeMethod, SdesKey, SdesSuite};
use sdpneg::sdp::{MediaLine, Setup};
use sdpneg::{CallState, Calls, EndReason, MediaKind, NegotiationConfig, NegotiationError};
use sdpneg::{Output, SecureCallMode, SipMessage};

mod common;
use common::*;

fn required() -> NegotiationConfig {
    NegotiationConfig::new().set_secure_call_mode(SecureCallMode::Required)
}

/// An m-line with attributes given as owned strings.
fn line(typ: &str, port: u16, proto: &str, pts: &[u8], attrs: &[String]) -> MediaLine {
    let attrs: Vec<&str> = attrs.iter().map(|s| s.as_str()).collect();
    m(typ, port, proto, pts, &attrs)
}

fn sdes_offer(audio_keys: &[SdesKey], video_keys: &[SdesKey]) -> sdpneg::Sdp {
    let crypto = |keys: &[SdesKey]| -> Vec<String> {
        keys.iter()
            .enumerate()
            .map(|(i, k)| format!("crypto:{}", k.to_crypto(i as u32 + 1)))
            .collect()
    };

    let mut video = crypto(video_keys);
    video.push("rtpmap:97 H264/90000".into());
    video.push("fmtp:97 profile-level-id=42e01f;packetization-mode=1".into());

    sdp(
        REMOTE_IP,
        &[],
        vec![
            line("audio", 5000, "RTP/SAVP", &[0], &crypto(audio_keys)),
            line("video", 5002, "RTP/SAVP", &[97], &video),
        ],
    )
}

fn answer_of(out: &[Output]) -> sdpneg::Sdp {
    out.iter()
        .find_map(|o| match o {
            Output::Accept { sdp: Some(s) } => Some(s.clone()),
            _ => None,
        })
        .expect("Accept with SDP")
}

#[test]
pub fn dtls_answer_takes_active_role() {
    init_log();

    let mut calls = Calls::new();
    let ctx = DtlsContext::new(fingerprint(1));
    let (leg, sessions) = plain_leg(&mut calls, required());
    let mut leg = leg.with_dtls(ctx.clone());

    let remote_fp = fingerprint(0xab);
    let fp_attr = format!("fingerprint:{}", remote_fp);
    let offer = sdp(
        REMOTE_IP,
        &["setup:actpass", &fp_attr],
        vec![
            m("audio", 5000, "RTP/SAVP", &[0], &[]),
            m(
                "video",
                5002,
                "RTP/SAVP",
                &[97],
                &["rtpmap:97 H264/90000"],
            ),
        ],
    );

    leg.process_sdp(&mut calls, SipMessage::Invite, Some(&offer))
        .unwrap();
    drain(&mut leg);

    assert!(sessions.audio.log.lock().unwrap().dtls.is_some());
    assert!(sessions.video.log.lock().unwrap().dtls.is_some());
    assert_eq!(ctx.remote_fingerprint(), Some(remote_fp));
    assert_eq!(ctx.remote_setup(), Some(Setup::ActPass));
    assert_eq!(ctx.local_setup(), Some(Setup::Active));
    assert_eq!(
        leg.key_exchange_method(&calls, MediaKind::Video).unwrap(),
        KeyExchangeMethod::DtlsSrtp
    );

    leg.accept(&mut calls).unwrap();
    let answer = answer_of(&drain(&mut leg));

    for l in &answer.media_lines {
        assert_eq!(l.setup(), Some(Setup::Active));
        assert_eq!(l.fingerprint(), Some(&fingerprint(1)));
        assert_eq!(l.crypto().count(), 0);
    }
}

#[test]
pub fn dtls_starts_before_media_on_reinvite() {
    init_log();

    let mut calls = Calls::new();
    let (leg, _) = plain_leg(&mut calls, required());
    let mut leg = leg.with_dtls(DtlsContext::new(fingerprint(1)));

    let fp_attr = format!("fingerprint:{}", fingerprint(2));
    let offer = |version| {
        let mut s = sdp(
            REMOTE_IP,
            &["setup:actpass", &fp_attr],
            vec![
                m("audio", 5000, "RTP/SAVP", &[0], &[]),
                m("video", 5002, "RTP/SAVP", &[97], &["rtpmap:97 H264/90000"]),
            ],
        );
        s.origin.version = version;
        s
    };

    leg.process_sdp(&mut calls, SipMessage::Invite, Some(&offer(1)))
        .unwrap();
    leg.accept(&mut calls).unwrap();
    leg.connected(&mut calls).unwrap();
    drain(&mut leg);

    leg.process_sdp(&mut calls, SipMessage::Invite, Some(&offer(2)))
        .unwrap();
    let out = drain(&mut leg);
    assert_eq!(out[0], Output::DtlsBegin { reply: false });
}

#[test]
pub fn sdes_picks_first_local_suite_peer_has() {
    init_log();

    use SdesSuite::*;
    let mut calls = Calls::new();
    let config = required().set_sdes_suites(&[Aes256CmHmacSha1_80, AesCm128HmacSha1_80]);
    let (mut leg, sessions) = plain_leg(&mut calls, config);

    let peer = [
        SdesKey::generate(AesCm128HmacSha1_80),
        SdesKey::generate(AesCm128HmacSha1_32),
    ];
    let offer = sdes_offer(&peer, &peer);

    leg.process_sdp(&mut calls, SipMessage::Invite, Some(&offer))
        .unwrap();
    drain(&mut leg);

    let keys = sessions.audio.log.lock().unwrap().sdes.clone().unwrap();
    assert_eq!(keys.encrypt.suite(), AesCm128HmacSha1_80);
    assert_eq!(keys.decrypt, peer[0]);
    assert_eq!(
        leg.key_exchange_method(&calls, MediaKind::Audio).unwrap(),
        KeyExchangeMethod::Sdes
    );

    leg.accept(&mut calls).unwrap();
    let answer = answer_of(&drain(&mut leg));

    let a = &answer.media_lines[0];
    let crypto: Vec<_> = a.crypto().collect();
    assert_eq!(crypto.len(), 1);
    assert_eq!(crypto[0].suite, "AES_CM_128_HMAC_SHA1_80");

    // The key we announce is the one we encrypt with.
    let announced = SdesKey::from_crypto(crypto[0]).unwrap();
    assert_eq!(announced, keys.encrypt);
}

#[test]
pub fn required_without_keys_ends_call() {
    init_log();

    let mut calls = Calls::new();
    let (mut leg, _) = plain_leg(&mut calls, required());

    let err = leg
        .process_sdp(&mut calls, SipMessage::Invite, Some(&basic_offer()))
        .unwrap_err();
    assert!(matches!(err, NegotiationError::SecurityInadequate));
    assert_eq!(err.sip_response(), Some(488));

    assert_eq!(
        drain(&mut leg),
        vec![Output::EndCall {
            reason: EndReason::SecurityInadequate,
            sip_code: 488
        }]
    );
    assert_eq!(
        calls.get(leg.call_id()).unwrap().state,
        CallState::Disconnecting
    );
}

#[test]
pub fn preferred_falls_back_to_clear_media() {
    init_log();

    let mut calls = Calls::new();
    let (mut leg, sessions) = plain_leg(&mut calls, NegotiationConfig::new());

    leg.process_sdp(&mut calls, SipMessage::Invite, Some(&basic_offer()))
        .unwrap();
    leg.accept(&mut calls).unwrap();
    let answer = answer_of(&drain(&mut leg));

    for l in &answer.media_lines {
        assert_eq!(l.crypto().count(), 0);
        assert_eq!(l.setup(), None);
    }
    assert!(sessions.audio.log.lock().unwrap().sdes.is_none());
    assert!(sessions.audio.log.lock().unwrap().disabled > 0);
}

#[test]
pub fn same_keys_again_change_nothing() {
    init_log();

    use SdesSuite::*;
    let mut calls = Calls::new();
    let (mut leg, sessions) = plain_leg(&mut calls, required());

    let peer = [SdesKey::generate(AesCm128HmacSha1_80)];
    let mut offer = sdes_offer(&peer, &peer);

    leg.process_sdp(&mut calls, SipMessage::Invite, Some(&offer))
        .unwrap();
    leg.accept(&mut calls).unwrap();
    leg.connected(&mut calls).unwrap();
    drain(&mut leg);

    let first = sessions.video.log.lock().unwrap().sdes.clone().unwrap();

    offer.origin.version = 2;
    leg.process_sdp(&mut calls, SipMessage::Invite, Some(&offer))
        .unwrap();
    drain(&mut leg);

    {
        let log = sessions.video.log.lock().unwrap();
        assert_eq!(log.new_ssrc, 0);
        assert_eq!(log.sdes.as_ref(), Some(&first));
    }

    // The peer rekeys. We follow with a new SSRC and a new key of our own.
    let rekeyed = [SdesKey::generate(AesCm128HmacSha1_80)];
    let mut offer = sdes_offer(&rekeyed, &rekeyed);
    offer.origin.version = 3;
    leg.process_sdp(&mut calls, SipMessage::Invite, Some(&offer))
        .unwrap();

    let log = sessions.video.log.lock().unwrap();
    assert_eq!(log.new_ssrc, 1);
    let second = log.sdes.clone().unwrap();
    assert_eq!(second.decrypt, rekeyed[0]);
    assert_ne!(second.encrypt, first.encrypt);
}

#[test]
pub fn two_legs_agree_on_keys() {
    init_log();

    let mut calls = Calls::new();
    let (mut caller, caller_sessions) = plain_leg(&mut calls, NegotiationConfig::new());
    let (mut callee, callee_sessions) = plain_leg(&mut calls, NegotiationConfig::new());

    caller.invite(&mut calls).unwrap();
    let offer = match drain(&mut caller).into_iter().next() {
        Some(Output::Invite { sdp }) => sdp,
        o => panic!("no INVITE: {:?}", o),
    };
    // Every suite we support is offered on every line.
    assert_eq!(offer.media_lines[0].crypto().count(), SdesSuite::DEFAULT.len());

    callee
        .process_sdp(&mut calls, SipMessage::Invite, Some(&offer))
        .unwrap();
    drain(&mut callee);
    callee.accept(&mut calls).unwrap();
    let answer = answer_of(&drain(&mut callee));

    caller
        .process_sdp(&mut calls, SipMessage::InviteFinalResponse, Some(&answer))
        .unwrap();
    assert!(caller.offer_answer_complete());
    assert!(callee.offer_answer_complete());

    for (a, b) in [
        (&caller_sessions.audio, &callee_sessions.audio),
        (&caller_sessions.video, &callee_sessions.video),
    ] {
        let a = a.log.lock().unwrap().sdes.clone().unwrap();
        let b = b.log.lock().unwrap().sdes.clone().unwrap();
        assert_eq!(a.encrypt, b.decrypt);
        assert_eq!(a.decrypt, b.encrypt);
        assert_eq!(a.encrypt.suite(), SdesSuite::DEFAULT[0]);
    }
}
