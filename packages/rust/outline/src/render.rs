//! Write a course tree back out in the outline dialect.
//!
//! Parsing the rendered text yields the same field values, as long as no
//! Text Content line would itself classify as a marker or directive.

use std::fmt::Write;

use curriculum_shared::{ClassFields, Course};

use crate::classifier::DirectiveKey;

/// Render a course as an outline document.
pub fn render_outline(course: &Course) -> String {
    let mut out = String::new();
    let fields = &course.fields;

    directive_if(&mut out, DirectiveKey::CourseType, &fields.course_type);
    if let Some(role) = &fields.role {
        directive(&mut out, DirectiveKey::Role, role);
    }
    if let Some(skill) = &fields.skill {
        directive(&mut out, DirectiveKey::Skill, skill);
    }
    if let Some(company) = &fields.company_name {
        directive(&mut out, DirectiveKey::Company, company);
    }
    directive_if(&mut out, DirectiveKey::CourseTitle, &fields.title);
    if let Some(id) = &course.id {
        directive(&mut out, DirectiveKey::CourseId, id);
    }
    directive_if(&mut out, DirectiveKey::CourseDescription, &fields.description);

    for module in &course.modules {
        let m = &module.fields;
        let _ = writeln!(out, "\nModule {}:", m.order);
        directive_if(&mut out, DirectiveKey::Title, &m.title);
        directive_if(&mut out, DirectiveKey::Description, &m.description);
        if !m.learning_outcomes.is_empty() {
            out.push_str("Learning Outcomes:\n");
            bullets(&mut out, &m.learning_outcomes);
        }

        for topic in &module.topics {
            let t = &topic.fields;
            let _ = writeln!(out, "\nTopic {}.{}:", m.order, t.order);
            directive_if(&mut out, DirectiveKey::Title, &t.title);

            for class in &topic.classes {
                let _ = writeln!(out, "\nClass {}.{}.{}:", m.order, t.order, class.fields.order);
                render_class(&mut out, &class.fields);
            }
        }
    }

    out
}

fn render_class(out: &mut String, c: &ClassFields) {
    directive_if(out, DirectiveKey::Title, &c.title);
    if let Some(description) = &c.description {
        directive(out, DirectiveKey::Description, description);
    }
    directive(out, DirectiveKey::ContentType, c.content_type.as_str());
    directive(out, DirectiveKey::Duration, &c.duration_secs.to_string());
    if let Some(url) = &c.video_url {
        directive(out, DirectiveKey::VideoUrl, url);
    }
    if let Some(url) = &c.contest_url {
        directive(out, DirectiveKey::ContestUrl, url);
    }
    if let Some(n) = c.contest_questions {
        directive(out, DirectiveKey::ContestQuestions, &n.to_string());
    }
    if let Some(syllabus) = &c.contest_syllabus {
        out.push_str("Contest Syllabus:\n");
        bullets(out, syllabus);
    }
    // Last, so the body runs until the next marker.
    if let Some(text) = &c.text_content {
        out.push_str("Text Content:\n");
        if !text.is_empty() {
            out.push_str(text);
            out.push('\n');
        }
    }
}

fn directive(out: &mut String, key: DirectiveKey, value: &str) {
    let _ = writeln!(out, "{}: {value}", key.label());
}

fn directive_if(out: &mut String, key: DirectiveKey, value: &str) {
    if !value.is_empty() {
        directive(out, key, value);
    }
}

fn bullets(out: &mut String, items: &[String]) {
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
}
