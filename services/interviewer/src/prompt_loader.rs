use anyhow::{Context, Result};
use preppal_core::stages::StageTemplates;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Prompt overrides in `dir`, one per `<stage>.md` file, keyed by stage name.
pub fn load_prompts(dir: &Path) -> Result<HashMap<String, String>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Cannot read prompt directory {}", dir.display()))?;

    let mut prompts = HashMap::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() || path.extension().is_none_or(|ext| ext != "md") {
            continue;
        }
        let Some(stage) = path.file_stem().and_then(|stem| stem.to_str()) else {
            tracing::warn!("Skipping prompt file with a non-UTF-8 name: {}", path.display());
            continue;
        };
        let source = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read prompt file {}", path.display()))?;
        prompts.insert(stage.to_string(), source);
    }

    Ok(prompts)
}

/// Built-in stage templates, overridden by any matching files in `dir`.
pub fn stage_templates(dir: Option<&Path>) -> Result<StageTemplates> {
    let templates = StageTemplates::default();
    match dir {
        Some(dir) => {
            let overrides = load_prompts(dir)?;
            tracing::info!("Loaded {} prompt file(s) from {}", overrides.len(), dir.display());
            Ok(templates.with_overrides(&overrides))
        }
        None => Ok(templates),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_prompts_reads_only_markdown_files() -> Result<()> {
        let dir = tempdir()?;
        let dir_path = dir.path();

        let mut summarizer = File::create(dir_path.join("summarizer.md"))?;
        summarizer.write_all(b"Condense this: {{ history }}\n")?;

        let mut interviewer = File::create(dir_path.join("interviewer.md"))?;
        writeln!(interviewer, "Be brief.")?;

        let mut ignored = File::create(dir_path.join("notes.txt"))?;
        writeln!(ignored, "not a prompt")?;
        std::fs::create_dir(dir_path.join("drafts.md"))?;

        let prompts = load_prompts(dir_path)?;

        assert_eq!(prompts.len(), 2, "Should only load .md files");
        assert_eq!(
            prompts.get("summarizer").unwrap(),
            "Condense this: {{ history }}\n"
        );
        assert_eq!(prompts.get("interviewer").unwrap(), "Be brief.\n");
        assert!(prompts.get("notes").is_none());
        assert!(prompts.get("drafts").is_none());

        Ok(())
    }

    #[test]
    fn test_load_prompts_from_nonexistent_dir() {
        let result = load_prompts(Path::new("nonexistent_dir_for_testing_prompts"));
        assert!(result.is_err());
    }

    #[test]
    fn test_stage_templates_apply_overrides() -> Result<()> {
        let dir = tempdir()?;
        let mut evaluator = File::create(dir.path().join("evaluator_final.md"))?;
        evaluator.write_all(b"Final verdict for {{ candidate_name }}")?;

        let templates = stage_templates(Some(dir.path()))?;
        assert_eq!(
            templates.evaluator_final.source(),
            "Final verdict for {{ candidate_name }}"
        );
        assert_eq!(
            templates.summarizer,
            StageTemplates::default().summarizer,
            "Templates without a file keep their built-in text"
        );

        Ok(())
    }

    #[test]
    fn test_stage_templates_without_dir_are_built_in() -> Result<()> {
        let templates = stage_templates(None)?;
        assert_eq!(templates.interviewer, StageTemplates::default().interviewer);
        Ok(())
    }
}
