//! In-page probes that read the current stream URL out of known player shapes.
//!
//! Each strategy is one small script body returning a URL string or `null`.
//! A poll round sends all of them in a single script that tries them in
//! priority order and reports which one answered, so one round costs one
//! driver call.

use serde_json::Value;

use crate::browser::BrowserSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStrategy {
    /// Global player implementation object (`window.ap._impl`).
    PlayerImpl,
    /// Player returned by the page's `getAudioPlayer()` factory.
    PlayerFactory,
    /// Plain HTML5 `<audio>` element.
    MediaElement,
    /// Any global value constructed by `AudioPlayer`.
    PlayerInstances,
    /// Page-scoped player (`window.cur.audioPlayer`).
    PagePlayer,
}

impl ProbeStrategy {
    /// Priority order.
    pub const ALL: [ProbeStrategy; 5] = [
        ProbeStrategy::PlayerImpl,
        ProbeStrategy::PlayerFactory,
        ProbeStrategy::MediaElement,
        ProbeStrategy::PlayerInstances,
        ProbeStrategy::PagePlayer,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ProbeStrategy::PlayerImpl => "player-impl",
            ProbeStrategy::PlayerFactory => "player-factory",
            ProbeStrategy::MediaElement => "media-element",
            ProbeStrategy::PlayerInstances => "player-instances",
            ProbeStrategy::PagePlayer => "page-player",
        }
    }

    pub fn script(self) -> &'static str {
        match self {
            ProbeStrategy::PlayerImpl => {
                r#"try {
    var impl = window.ap && window.ap._impl;
    if (impl) {
        if (impl._currentAudio && impl._currentAudio.url) return impl._currentAudio.url;
        if (impl.currentAudio && impl.currentAudio.url) return impl.currentAudio.url;
    }
} catch (e) {}
return null;"#
            }
            ProbeStrategy::PlayerFactory => {
                r#"try {
    if (typeof getAudioPlayer === 'function') {
        var player = getAudioPlayer();
        if (player) {
            if (player._impl && player._impl._currentAudio && player._impl._currentAudio.url) {
                return player._impl._currentAudio.url;
            }
            if (player.getCurrentAudio) {
                var audio = player.getCurrentAudio();
                if (audio && audio.url) return audio.url;
            }
        }
    }
} catch (e) {}
return null;"#
            }
            ProbeStrategy::MediaElement => {
                r#"try {
    var el = document.querySelector('audio');
    if (el && el.src && el.src.length > 10) return el.src;
} catch (e) {}
return null;"#
            }
            ProbeStrategy::PlayerInstances => {
                r#"try {
    if (window.AudioPlayer && window.AudioPlayer.prototype) {
        var found = Object.values(window).filter(function (v) {
            return v && v.constructor && v.constructor.name === 'AudioPlayer';
        });
        for (var i = 0; i < found.length; i++) {
            if (found[i]._currentAudio && found[i]._currentAudio.url) return found[i]._currentAudio.url;
        }
    }
} catch (e) {}
return null;"#
            }
            ProbeStrategy::PagePlayer => {
                r#"try {
    var p = window.cur && window.cur.audioPlayer;
    if (p && p._impl && p._impl._currentAudio && p._impl._currentAudio.url) {
        return p._impl._currentAudio.url;
    }
} catch (e) {}
return null;"#
            }
        }
    }
}

/// Stops whatever the page player is doing. Every branch is guarded.
pub const PAUSE_SCRIPT: &str = r#"try {
    if (window.ap && window.ap.pause) window.ap.pause();
    if (typeof getAudioPlayer === 'function') {
        var p = getAudioPlayer();
        if (p && p.pause) p.pause();
    }
    var el = document.querySelector('audio');
    if (el) el.pause();
} catch (e) {}
return null;"#;

/// One script running `strategies` in order. It returns `[index, url]` for
/// the first strategy that yields an http(s) URL, or `null`. `index` points
/// into `strategies`.
pub fn probe_script(strategies: &[ProbeStrategy]) -> String {
    let mut script = String::from("var probes = [\n");
    for s in strategies {
        script.push_str("function () {\n");
        script.push_str(s.script());
        script.push_str("\n},\n");
    }
    script.push_str(
        r#"];
for (var i = 0; i < probes.length; i++) {
    var url = null;
    try { url = probes[i](); } catch (e) {}
    if (typeof url === 'string' && /^https?:/i.test(url)) return [i, url];
}
return null;"#,
    );
    script
}

/// Runs one probe round and returns the first URL any strategy yields.
/// Script errors count as "no URL".
pub fn first_url<S: BrowserSession + ?Sized>(
    session: &S,
    strategies: &[ProbeStrategy],
) -> Option<(ProbeStrategy, String)> {
    if strategies.is_empty() {
        return None;
    }
    let value = match session.evaluate_script(&probe_script(strategies), &[]) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("probe script failed: {}", e);
            return None;
        }
    };
    let hit = value.as_array()?;
    let index = usize::try_from(hit.first()?.as_u64()?).ok()?;
    let strategy = *strategies.get(index)?;
    let url = accept_url(hit.get(1)?)?;
    Some((strategy, url))
}

/// Keeps only fetchable http(s) URLs; `blob:` and `data:` sources are useless
/// outside the page.
pub fn accept_url(value: &Value) -> Option<String> {
    let raw = value.as_str()?.trim();
    let parsed = url::Url::parse(raw).ok()?;
    match parsed.scheme() {
        "http" | "https" => Some(raw.to_string()),
        _ => None,
    }
}
