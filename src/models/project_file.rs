use serde::{ser::SerializeStruct, Deserialize, Serialize};

/// Reference to a blender project the backend knows about.
///
/// The file name is always derived from `path` (either separator style), never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "ProjectFileRecord")]
pub struct ProjectFile {
    path: String,
}

impl ProjectFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        self.path
            .trim_end_matches(['/', '\\'])
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
    }
}

impl Serialize for ProjectFile {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ProjectFile", 2)?;
        state.serialize_field("path", &self.path)?;
        state.serialize_field("file_name", self.file_name())?;
        state.end()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProjectFileRecord {
    Path(String),
    Record {
        #[serde(alias = "src")]
        path: String,
    },
}

impl From<ProjectFileRecord> for ProjectFile {
    fn from(record: ProjectFileRecord) -> Self {
        match record {
            ProjectFileRecord::Path(path) | ProjectFileRecord::Record { path } => Self { path },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_from_either_separator() {
        assert_eq!(ProjectFile::new("/home/jordan/scene.blend").file_name(), "scene.blend");
        assert_eq!(ProjectFile::new(r"C:\Users\jordan\scene.blend").file_name(), "scene.blend");
        assert_eq!(ProjectFile::new(r"D:\mixed/dir\shot_010.blend").file_name(), "shot_010.blend");
        assert_eq!(ProjectFile::new("scene.blend").file_name(), "scene.blend");
        assert_eq!(ProjectFile::new("/renders/").file_name(), "renders");
    }

    #[test]
    fn accepts_string_or_record() {
        let a: ProjectFile = serde_json::from_str(r#""/tmp/a.blend""#).unwrap();
        let b: ProjectFile =
            serde_json::from_str(r#"{"path":"/tmp/a.blend","file_name":"stale"}"#).unwrap();
        assert_eq!(a, b);
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["file_name"], "a.blend");
    }
}
