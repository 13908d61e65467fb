use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::{Deserialize, Deserializer};
use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::error::{self, RehabError};
use crate::gestures::Exercise;
use crate::tracker::MIN_STATE_DURATION_MS;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Timing {
    /// Minimum hold between accepted transitions for the debounced exercises.
    pub min_state_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            min_state_ms: MIN_STATE_DURATION_MS,
        }
    }
}

/// OPEN above `open`, CLOSED below `closed`, TRANSITION in between.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OpenCloseThresholds {
    pub open: f32,
    pub closed: f32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SpreadThresholds {
    pub spread: f32,
    pub closed: f32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LiftThresholds {
    pub up: f32,
    pub down: f32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ContactThresholds {
    pub touch: f32,
    pub release: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_open_close")]
    pub open_close: OpenCloseThresholds,
    #[serde(default = "default_pinch")]
    pub pinch: OpenCloseThresholds,
    #[serde(default = "default_abduction")]
    pub abduction_adduction: SpreadThresholds,
    #[serde(default = "default_finger_lifts")]
    pub finger_lifts: LiftThresholds,
    #[serde(default = "default_thumb_opposition")]
    pub thumb_opposition: ContactThresholds,
}

fn default_open_close() -> OpenCloseThresholds {
    OpenCloseThresholds {
        open: 0.25,
        closed: 0.15,
    }
}

fn default_pinch() -> OpenCloseThresholds {
    OpenCloseThresholds {
        open: 0.08,
        closed: 0.04,
    }
}

fn default_abduction() -> SpreadThresholds {
    SpreadThresholds {
        spread: 0.34,
        closed: 0.20,
    }
}

fn default_finger_lifts() -> LiftThresholds {
    LiftThresholds {
        up: 0.055,
        down: 0.035,
    }
}

fn default_thumb_opposition() -> ContactThresholds {
    ContactThresholds {
        touch: 0.22,
        release: 0.28,
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            open_close: default_open_close(),
            pinch: default_pinch(),
            abduction_adduction: default_abduction(),
            finger_lifts: default_finger_lifts(),
            thumb_opposition: default_thumb_opposition(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub thresholds: Thresholds,

    // Accept nested/dotted tables and flatten them into "exercise.LABEL" -> "text"
    #[serde(default, deserialize_with = "deserialize_feedback_flat")]
    pub feedback: HashMap<String, String>,
}

impl Profile {
    pub fn feedback_override(&self, exercise: Exercise, label: &str) -> Option<&str> {
        self.feedback
            .get(&format!("{}.{}", exercise.as_str(), label))
            .map(String::as_str)
    }
}

// --------- feedback table deserializer (tolerant) ----------
fn deserialize_feedback_flat<'de, D>(
    de: D,
) -> std::result::Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = toml::Value::deserialize(de)?;
    let table = match val {
        toml::Value::Table(t) => t,
        other => {
            return Err(serde::de::Error::custom(format!(
                "feedback must be a table, got {:?}",
                other.type_str()
            )));
        }
    };

    let mut out = HashMap::new();
    flatten_table("", &table, &mut out).map_err(serde::de::Error::custom)?;
    Ok(out)
}

fn flatten_table(
    prefix: &str,
    table: &toml::value::Table,
    out: &mut HashMap<String, String>,
) -> std::result::Result<(), String> {
    for (k, v) in table {
        let key = if prefix.is_empty() {
            k.clone()
        } else {
            format!("{prefix}.{k}")
        };
        match v {
            toml::Value::String(s) => {
                out.insert(key, s.clone());
            }
            toml::Value::Table(sub) => {
                flatten_table(&key, sub, out)?;
            }
            other => {
                return Err(format!(
                    "feedback '{}' must be a string, got {}",
                    key,
                    other.type_str()
                ));
            }
        }
    }
    Ok(())
}
// ------------------------------------------------------------

/// Parse and validate profile text.
pub fn parse_profile(txt: &str) -> error::Result<Profile> {
    let profile: Profile =
        toml::from_str(txt).map_err(|e| RehabError::InvalidProfile(e.to_string()))?;
    validate_profile(&profile)?;
    Ok(profile)
}

#[derive(Debug, Clone)]
pub struct DaemonConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

fn config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("could not determine home directory"))?;
    Ok(dirs.home_dir().join(".config").join("rehabctl"))
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl DaemonConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        Self::open(config_dir()?)
    }

    /// Load the active profile under `cfgdir`, installing the built-in
    /// default profile and pointer when they are missing.
    pub fn open(cfgdir: PathBuf) -> Result<Self> {
        let profdir = cfgdir.join("profiles");
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = cfgdir.join("active");
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = load_profile(&profdir, &active_name)?;
        info!(
            "loaded profile '{}' (min_state_ms={})",
            active_name, profile.timing.min_state_ms
        );

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    /// Re-read the active profile. On failure the last good profile stays.
    pub fn reload(&mut self) -> Result<()> {
        self.profile = load_profile(&self.profiles_dir, &self.active_name)?;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profile_path(name)?;
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        let profile = load_profile(&self.profiles_dir, name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    pub fn profile_path(&self, name: &str) -> Result<PathBuf> {
        profile_file(&self.profiles_dir, name)
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }
}

/// Profile names are bare file stems; anything that could leave the
/// profiles directory is refused.
fn profile_file(profiles_dir: &Path, name: &str) -> Result<PathBuf> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.contains("..");
    if bad {
        return Err(anyhow!("invalid profile name '{name}'"));
    }
    Ok(profiles_dir.join(format!("{name}.toml")))
}

fn load_profile(profiles_dir: &Path, name: &str) -> Result<Profile> {
    let path = profile_file(profiles_dir, name)?;
    let txt = fs::read_to_string(&path)
        .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
    parse_profile(&txt).map_err(|e| anyhow!("failed to load {}: {e}", path.display()))
}

fn check_band(what: &str, low: f32, high: f32) -> error::Result<()> {
    if !(low.is_finite() && high.is_finite()) || low <= 0.0 || high <= 0.0 {
        return Err(RehabError::InvalidProfile(format!(
            "{what} thresholds must be positive and finite"
        )));
    }
    if low >= high {
        return Err(RehabError::InvalidProfile(format!(
            "{what}: lower threshold {low} must be below upper threshold {high}"
        )));
    }
    Ok(())
}

fn validate_profile(p: &Profile) -> error::Result<()> {
    if p.timing.min_state_ms == 0 {
        return Err(RehabError::InvalidProfile(
            "timing.min_state_ms must be a positive duration".into(),
        ));
    }

    let th = &p.thresholds;
    check_band("open_close", th.open_close.closed, th.open_close.open)?;
    check_band("pinch", th.pinch.closed, th.pinch.open)?;
    check_band(
        "abduction_adduction",
        th.abduction_adduction.closed,
        th.abduction_adduction.spread,
    )?;
    check_band("finger_lifts", th.finger_lifts.down, th.finger_lifts.up)?;
    check_band(
        "thumb_opposition",
        th.thumb_opposition.touch,
        th.thumb_opposition.release,
    )?;

    for (k, v) in &p.feedback {
        let Some((exercise, label)) = k.split_once('.') else {
            return Err(RehabError::InvalidProfile(format!(
                "feedback key '{k}' must look like <exercise>.<LABEL>"
            )));
        };
        exercise
            .parse::<Exercise>()
            .map_err(|e| RehabError::InvalidProfile(format!("feedback '{k}': {e}")))?;
        if label.trim().is_empty() || v.trim().is_empty() {
            return Err(RehabError::InvalidProfile(format!(
                "feedback '{k}' has an empty label or text"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_matches_builtin_constants() {
        let p = parse_profile(default_profile_text()).expect("default profile parses");
        assert_eq!(p.meta.name.as_deref(), Some("default"));
        assert_eq!(p.timing.min_state_ms, 200);
        assert_eq!(p.thresholds.open_close.open, 0.25);
        assert_eq!(p.thresholds.pinch.closed, 0.04);
        assert_eq!(p.thresholds.abduction_adduction.spread, 0.34);
        assert_eq!(p.thresholds.finger_lifts.up, 0.055);
        assert_eq!(p.thresholds.thumb_opposition.release, 0.28);
    }

    #[test]
    fn test_sections_fall_back_to_defaults() {
        let p = parse_profile("[meta]\nname = \"slim\"\n").expect("parses");
        assert_eq!(p.timing.min_state_ms, 200);
        assert_eq!(p.thresholds.thumb_opposition.touch, 0.22);
        assert!(p.feedback.is_empty());
    }

    #[test]
    fn test_feedback_tables_are_flattened() {
        let txt = r#"
[feedback]
"pinch.OPEN" = "Fingers apart"

[feedback.open_close]
CLOSED = "Fist made"
"#;
        let p = parse_profile(txt).expect("parses");
        assert_eq!(
            p.feedback_override(Exercise::OpenClose, "CLOSED"),
            Some("Fist made")
        );
        assert_eq!(p.feedback_override(Exercise::Pinch, "OPEN"), Some("Fingers apart"));
        assert_eq!(p.feedback_override(Exercise::Pinch, "CLOSED"), None);
    }

    #[test]
    fn test_inverted_band_is_rejected() {
        let txt = "[thresholds.pinch]\nopen = 0.03\nclosed = 0.04\n";
        let err = parse_profile(txt).unwrap_err();
        assert!(err.to_string().contains("pinch"), "got {err}");
    }

    #[test]
    fn test_zero_hold_is_rejected() {
        assert!(parse_profile("[timing]\nmin_state_ms = 0\n").is_err());
    }

    #[test]
    fn test_feedback_for_unknown_exercise_is_rejected() {
        let txt = "[feedback]\n\"squats.DOWN\" = \"nope\"\n";
        let err = parse_profile(txt).unwrap_err();
        assert!(err.to_string().contains("squats"), "got {err}");
    }

    #[test]
    fn test_non_string_feedback_is_rejected() {
        assert!(parse_profile("[feedback]\n\"pinch.OPEN\" = 3\n").is_err());
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rehabctl-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_open_installs_default_profile() {
        let dir = scratch_dir("install");
        let cfg = DaemonConfigState::open(dir.clone()).expect("opens");
        assert_eq!(cfg.active_name, "default");
        assert!(dir.join("profiles").join("default.toml").exists());
        assert_eq!(cfg.list_profiles(), vec!["default"]);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_failed_reload_keeps_last_good_profile() {
        let dir = scratch_dir("reload");
        let mut cfg = DaemonConfigState::open(dir.clone()).expect("opens");
        let active = cfg.profile_path("default").expect("valid name");

        fs::write(&active, "[timing]\nmin_state_ms = 450\n").expect("write");
        cfg.reload().expect("valid profile reloads");
        assert_eq!(cfg.profile.timing.min_state_ms, 450);

        fs::write(&active, "[thresholds.pinch]\nopen = 0.01\nclosed = 0.02\n").expect("write");
        assert!(cfg.reload().is_err());
        assert_eq!(cfg.profile.timing.min_state_ms, 450, "last good profile kept");
        assert_eq!(cfg.profile.thresholds.pinch.open, 0.08);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_profile_names_cannot_escape_profiles_dir() {
        let dir = scratch_dir("names");
        let mut cfg = DaemonConfigState::open(dir.clone()).expect("opens");
        fs::write(dir.join("outside.toml"), "[meta]\nname = \"outside\"\n").expect("write");

        for name in ["../outside", "a/b", "..", ".hidden", "", "x\\y"] {
            assert!(cfg.set_active(name).is_err(), "accepted '{name}'");
        }
        assert_eq!(cfg.active_name, "default");
        let ptr = fs::read_to_string(&cfg.active_ptr).expect("pointer");
        assert_eq!(ptr.trim(), "default");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_set_active_switches_pointer() {
        let dir = scratch_dir("switch");
        let mut cfg = DaemonConfigState::open(dir.clone()).expect("opens");
        fs::write(
            cfg.profile_path("gentle").expect("valid name"),
            "[timing]\nmin_state_ms = 600\n",
        )
        .expect("write");
        cfg.set_active("gentle").expect("switches");
        assert_eq!(cfg.profile.timing.min_state_ms, 600);
        assert_eq!(fs::read_to_string(&cfg.active_ptr).expect("pointer"), "gentle");
        assert!(cfg.set_active("missing").is_err());
        assert_eq!(cfg.active_name, "gentle");
        let _ = fs::remove_dir_all(&dir);
    }
}
