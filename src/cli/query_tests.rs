//! Tests for the query commands.

use super::*;
use super::super::query_format::*;
use crate::ipc::transaction::WideString;

fn details(name: &str, language: &str, locales: &str) -> [Response; 3] {
    [
        Response::FactoryName(WideString::from(name)),
        Response::FactoryLanguage(language.to_string()),
        Response::FactoryLocales(locales.to_string()),
    ]
}

#[test]
fn test_build_factory_list() {
    let uuids = vec!["a".to_string(), "b".to_string()];
    let mut responses = details("Anthy", "ja_JP", "ja_JP.UTF-8,ja_JP.EUC-JP").to_vec();
    responses.extend(details("Echo", "en", ""));

    let factories = build_factory_list(&uuids, &responses).unwrap();
    assert_eq!(factories.len(), 2);
    assert_eq!(factories[0].name, "Anthy");
    assert_eq!(factories[0].locales, vec!["ja_JP.UTF-8", "ja_JP.EUC-JP"]);
    assert_eq!(factories[1].uuid, "b");
    assert!(factories[1].locales.is_empty());
}

#[test]
fn test_build_factory_list_rejects_mismatch() {
    let uuids = vec!["a".to_string()];
    assert!(build_factory_list(&uuids, &details("x", "en", "")[..2]).is_err());

    let shuffled = [
        Response::FactoryLanguage("en".into()),
        Response::FactoryName(WideString::from("x")),
        Response::FactoryLocales(String::new()),
    ];
    assert!(build_factory_list(&uuids, &shuffled).is_err());
}

#[test]
fn test_option_flags() {
    assert!(option_flags(0).is_empty());
    assert_eq!(
        option_flags(HelperInfo::STAND_ALONE | HelperInfo::NEED_SPOT_LOCATION_INFO),
        vec!["stand-alone", "need-spot-location-info"]
    );
}

#[test]
fn test_helper_status_from_info() {
    let status = HelperStatus::from(HelperInfo {
        uuid: "u".into(),
        name: "Keyboard".into(),
        icon: String::new(),
        description: "On-screen keyboard".into(),
        option: HelperInfo::AUTO_START,
    });
    assert_eq!(status.flags, vec!["auto-start"]);
    assert_eq!(format_flags(&status.flags), "auto-start");
    assert_eq!(format_flags(&[]), "-");
}

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("this is a very long string", 10), "this is...");
    assert_eq!(truncate("かなかなかなかな", 5), "かな...");
}

#[test]
fn test_status_serializes_to_json() {
    let status = FactoryStatus {
        uuid: "a".into(),
        name: "Echo".into(),
        language: "en".into(),
        locales: vec!["en_US.UTF-8".into()],
    };
    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["language"], "en");
    assert_eq!(json["locales"][0], "en_US.UTF-8");
}
