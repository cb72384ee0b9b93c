//! Fixed catalogs the fuzz session picks from when dressing up a page.

/// Character encoding labels the body may be encoded with. Every entry is
/// a label `encoding_rs` resolves; EBCDIC code pages are never offered.
pub const CODEC_NAMES: &[&str] = &[
    "ascii",
    "big5",
    "big5-hkscs",
    "cp1250",
    "cp1251",
    "cp1252",
    "cp1253",
    "cp1254",
    "cp1255",
    "cp1256",
    "cp1257",
    "cp1258",
    "cp866",
    "euc-jp",
    "euc-kr",
    "gb18030",
    "gb2312",
    "gbk",
    "iso-2022-jp",
    "iso-8859-16",
    "iso8859-10",
    "iso8859-13",
    "iso8859-14",
    "iso8859-15",
    "iso8859-2",
    "iso8859-3",
    "iso8859-4",
    "iso8859-5",
    "iso8859-6",
    "iso8859-7",
    "iso8859-8",
    "koi8-r",
    "koi8-u",
    "latin1",
    "macintosh",
    "shift_jis",
    "utf-16",
    "utf-16be",
    "utf-16le",
    "utf-8",
    "windows-874",
    "x-mac-cyrillic",
];

/// Alternative spellings clients are expected to understand.
pub const CODEC_NAME_ALIASES: &[(&str, &str)] =
    &[("macintosh", "x-mac-roman"), ("shift_jis", "x-sjis")];

#[must_use]
pub fn codec_alias(name: &str) -> Option<&'static str> {
    CODEC_NAME_ALIASES
        .iter()
        .find(|(codec, _)| *codec == name)
        .map(|(_, alias)| *alias)
}

/// Upper-cased with `_` turned into `-`, the way the name shows up in a
/// charset declaration.
#[must_use]
pub fn declared_name(codec: &str) -> String {
    codec.to_uppercase().replace('_', "-")
}

/// `{name}` is replaced by the declared encoding name.
pub const CHARSET_DECLARATIONS: &[&str] = &[
    "",
    r#"<META HTTP-EQUIV="Content-Type" CONTENT="text/html; charset={name}">"#,
    "<META HTTP-EQUIV=Content-Type CONTENT=text/html; charset={name}>",
    "<META CHARSET={name}>",
];

pub const DEFAULT_DOCTYPE: &str = "<!DOCTYPE html>";

pub const DOCTYPES: &[&str] = &[
    "",
    "<!DOGTYPE>",
    r#"<!DOCTYPE HTML PUBLIC "-//W3C//DTD HTML 4.01//EN" "http://www.w3.org/TR/html4/strict.dtd">"#,
    r#"<!DOCTYPE HTML PUBLIC "-//W3C//DTD HTML 4.01 Transitional//EN" "http://www.w3.org/TR/html4/loose.dtd">"#,
    r#"<?xml version="1.0" encoding="UTF-8"?><!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd">"#,
    r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.1//EN" "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd">"#,
    "<!DOCTYPE html>",
    "<!doctype html>",
    "<doctype html>",
];
