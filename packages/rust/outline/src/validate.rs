//! Required-field checks run after parsing and before any persistence call.

use url::Url;

use curriculum_shared::{ContentType, CurriculumError, Result, ScratchId};

use crate::Outline;

/// Report the first missing or unusable field, citing its marker line.
pub fn validate(outline: &Outline) -> Result<()> {
    let course = &outline.course;
    let line_of = |id: ScratchId| outline.source_map.line_of(id);

    if course.fields.title.trim().is_empty() {
        return Err(CurriculumError::validation(
            outline.source_map.course_title_line,
            "course title is empty",
        ));
    }

    for module in &course.modules {
        if module.fields.title.trim().is_empty() {
            return Err(CurriculumError::validation(
                line_of(module.scratch_id),
                format!("Module {} has no title", module.fields.order),
            ));
        }

        for topic in &module.topics {
            if topic.fields.title.trim().is_empty() {
                return Err(CurriculumError::validation(
                    line_of(topic.scratch_id),
                    format!(
                        "Topic {}.{} has no title",
                        module.fields.order, topic.fields.order
                    ),
                ));
            }

            for class in &topic.classes {
                let fields = &class.fields;
                let line = line_of(class.scratch_id);
                let label = format!(
                    "Class {}.{}.{}",
                    module.fields.order, topic.fields.order, fields.order
                );

                if fields.title.trim().is_empty() {
                    return Err(CurriculumError::validation(
                        line,
                        format!("{label} has no title"),
                    ));
                }

                match fields.content_type {
                    ContentType::Video if fields.video_url.is_none() => {
                        return Err(CurriculumError::validation(
                            line,
                            format!("{label} is a video class without a Video URL"),
                        ));
                    }
                    ContentType::Contest if fields.contest_url.is_none() => {
                        return Err(CurriculumError::validation(
                            line,
                            format!("{label} is a contest class without a Contest URL"),
                        ));
                    }
                    _ => {}
                }

                for (name, value) in [
                    ("Video URL", &fields.video_url),
                    ("Contest URL", &fields.contest_url),
                ] {
                    if let Some(value) = value {
                        Url::parse(value).map_err(|e| {
                            CurriculumError::validation(
                                line,
                                format!("{label} {name} '{value}' is not an absolute URL: {e}"),
                            )
                        })?;
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_outline;
    use curriculum_shared::ParseOptions;

    fn check(input: &str) -> Result<()> {
        let outline = parse_outline(input, &ParseOptions::default()).expect("parse");
        validate(&outline)
    }

    const VALID: &str = "\
Course Title: Rust
Module 1:
Title: Basics
Topic 1.1:
Title: Ownership
Class 1.1.1:
Title: Moves
Content Type: video
Video URL: https://videos.example/moves
";

    #[test]
    fn accepts_complete_outline() {
        check(VALID).expect("valid outline");
    }

    #[test]
    fn rejects_missing_course_title() {
        let err = check("Module 1:\nTitle: Basics\n").expect_err("no title");
        assert!(err.to_string().contains("course title is empty"));
        assert_eq!(err.line(), None);
    }

    #[test]
    fn reports_marker_line_of_untitled_class() {
        let input = VALID.replace("Title: Moves\n", "");
        let err = check(&input).expect_err("untitled class");
        assert_eq!(err.line(), Some(6));
        assert!(err.to_string().contains("Class 1.1.1 has no title"));
    }

    #[test]
    fn video_class_needs_url() {
        let input = VALID.replace("Video URL: https://videos.example/moves\n", "");
        let err = check(&input).expect_err("missing video url");
        assert!(err.to_string().contains("without a Video URL"));
    }

    #[test]
    fn contest_class_needs_absolute_url() {
        let input = VALID
            .replace("Content Type: video", "Content Type: contest")
            .replace("Video URL: https://videos.example/moves", "Contest URL: /contests/7");
        let err = check(&input).expect_err("relative contest url");
        assert!(err.to_string().contains("is not an absolute URL"));
    }
}
