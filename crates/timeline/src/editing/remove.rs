use std::path::PathBuf;

use super::Edit;
use crate::{kind_of, ClipId, Selection, TimelineError, TimelineState};

pub fn delete_clips(state: &TimelineState, ids: &[ClipId]) -> Edit<usize> {
    let mut next = state.clone();
    next.clips.retain(|c| !ids.contains(&c.id));
    let removed = state.clips.len() - next.clips.len();
    next.prune_tracks();
    Edit::new(next, removed).with_selection(Selection::None)
}

/// Removes assets and every clip that references them.
pub fn remove_assets(state: &TimelineState, names: &[String]) -> Edit<usize> {
    let mut next = state.clone();
    next.assets.retain(|a| !names.contains(&a.name));
    next.clips.retain(|c| !names.contains(&c.asset_name));
    let removed = state.clips.len() - next.clips.len();
    next.prune_tracks();
    Edit::new(next, removed).with_selection(Selection::None)
}

/// Renames an asset and repoints its clips. The new name must keep the same
/// media kind and must not be taken.
pub fn rename_asset(
    state: &TimelineState,
    old: &str,
    new: &str,
    new_path: PathBuf,
) -> Result<Edit, TimelineError> {
    let asset = state.asset(old)?;
    let new = new.trim();
    if new.is_empty() {
        return Err(TimelineError::InvalidOp("asset name cannot be empty".into()));
    }
    if new == old {
        return Ok(Edit::new(state.clone(), ()));
    }
    if state.find_asset(new).is_some() {
        return Err(TimelineError::AssetExists(new.to_string()));
    }
    let kind = kind_of(new)?;
    if kind != asset.kind {
        return Err(TimelineError::InvalidOp(format!(
            "{new} is not a {:?} file",
            asset.kind
        )));
    }

    let mut next = state.clone();
    for a in next.assets.iter_mut().filter(|a| a.name == old) {
        a.name = new.to_string();
        a.path = new_path.clone();
    }
    for c in next.clips.iter_mut().filter(|c| c.asset_name == old) {
        c.asset_name = new.to_string();
    }
    Ok(Edit::new(next, ()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::fixtures::{clip, state};

    #[test]
    fn test_delete_clips_prunes_tracks() {
        let a = clip("a.mp4", 0, 0.0, 5.0);
        let b = clip("b.mp4", 3, 0.0, 5.0);
        let s = state(vec![a.clone(), b.clone()]);
        let edit = delete_clips(&s, &[b.id]);
        assert_eq!(edit.output, 1);
        assert!(edit.state.find_track(crate::TrackId(3)).is_none());
        assert_eq!(edit.selection, Some(Selection::None));
    }

    #[test]
    fn test_remove_asset_cascades() {
        let s = state(vec![
            clip("a.mp4", 0, 0.0, 5.0),
            clip("a.mp4", 0, 10.0, 5.0),
            clip("b.mp4", 1, 0.0, 5.0),
        ]);
        let edit = remove_assets(&s, &["a.mp4".to_string()]);
        assert_eq!(edit.output, 2);
        assert!(edit.state.find_asset("a.mp4").is_none());
        assert!(edit.state.clips.iter().all(|c| c.asset_name == "b.mp4"));
    }

    #[test]
    fn test_rename_repoints_clips() {
        let s = state(vec![clip("a.mp4", 0, 0.0, 5.0)]);
        let edit = rename_asset(&s, "a.mp4", "intro.mp4", "/p/videos/intro.mp4".into()).unwrap();
        assert_eq!(edit.state.clips[0].asset_name, "intro.mp4");
        let asset = edit.state.find_asset("intro.mp4").unwrap();
        assert_eq!(asset.path, PathBuf::from("/p/videos/intro.mp4"));
    }

    #[test]
    fn test_rename_validation() {
        let s = state(vec![]);
        assert!(matches!(
            rename_asset(&s, "a.mp4", "b.mp4", "/b".into()),
            Err(TimelineError::AssetExists(_))
        ));
        assert!(matches!(
            rename_asset(&s, "a.mp4", "a.txt", "/x".into()),
            Err(TimelineError::UnsupportedExtension(_))
        ));
        assert!(matches!(
            rename_asset(&s, "a.mp4", "a.mp3", "/x".into()),
            Err(TimelineError::InvalidOp(_))
        ));
        assert!(matches!(
            rename_asset(&s, "zzz.mp4", "y.mp4", "/x".into()),
            Err(TimelineError::AssetNotFound(_))
        ));
    }
}
