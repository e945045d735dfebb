//! Course page linking a course's published artifacts.
//!
//! After a run has published into `<semester>_<course code>/`, the folder
//! listing is read back, grouped into syllabus, assessments and outcome
//! reports, and rendered as a page that a module in the destination course
//! points to.

use anyhow::{Context, Result, bail};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::analyzers::analyzer::OUTCOME_REPORTS_FOLDER;
use crate::lms::{Course, FileInfo, Folder, Module, Page};
use crate::output::course_root_folder;
use crate::services::{CoursePublisher, LmsApi};

static EXAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)quiz|exam|test|midterm").expect("exam pattern is valid"));

static SAMPLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)-(high|avg|low)\.[a-z0-9]+$").expect("sample pattern is valid")
});

const GRADED_WORK_HEADER: &str = r#"<table style="width: 100%;" border="1">
<thead>
<tr><th>Assessment</th><th>High</th><th>Mid</th><th>Low</th></tr>
</thead>
<tbody>
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssessmentKind {
    Project,
    Exam,
}

impl AssessmentKind {
    /// Quizzes, tests and exams by folder name; everything else is a project.
    pub fn of(folder_name: &str) -> Self {
        if EXAM_RE.is_match(folder_name) {
            AssessmentKind::Exam
        } else {
            AssessmentKind::Project
        }
    }
}

/// One published assignment folder.
#[derive(Debug, Clone, Default)]
pub struct PublishedAssignment {
    pub name: String,
    pub files: Vec<FileInfo>,
}

impl PublishedAssignment {
    pub fn kind(&self) -> AssessmentKind {
        AssessmentKind::of(&self.name)
    }

    /// Sample file for `label` (`high`, `avg` or `low`).
    pub fn sample(&self, label: &str) -> Option<&FileInfo> {
        self.files.iter().find(|f| {
            SAMPLE_RE
                .captures(&f.filename)
                .is_some_and(|caps| caps[1].eq_ignore_ascii_case(label))
        })
    }

    /// The file describing the assessment itself: the staged description,
    /// else the first file that is not derived from submissions.
    pub fn instrument(&self) -> Option<&FileInfo> {
        self.files
            .iter()
            .find(|f| f.filename == "description.html")
            .or_else(|| self.files.iter().find(|f| !is_derived(&f.filename)))
    }
}

fn is_derived(filename: &str) -> bool {
    SAMPLE_RE.is_match(filename)
        || filename.ends_with("_details.json")
        || filename.starts_with("grade_report_")
        || filename == "rubric.json"
}

/// The published tree of one course and semester.
#[derive(Debug, Clone, Default)]
pub struct PublishedCourse {
    pub syllabus: Vec<FileInfo>,
    pub assignments: Vec<PublishedAssignment>,
    pub reports: Vec<FileInfo>,
}

impl PublishedCourse {
    /// Groups folder listings found under `root`. Assignments are ordered by name.
    pub fn from_listing(root: &str, listing: Vec<(Folder, Vec<FileInfo>)>) -> Self {
        let mut published = PublishedCourse::default();

        for (folder, files) in listing {
            let Some(relative) = relative_path(&folder, root) else {
                continue;
            };
            match relative.as_slice() {
                ["Syllabus"] => published.syllabus.extend(files),
                ["Assignments", _] => published.assignments.push(PublishedAssignment {
                    name: folder.name.clone(),
                    files,
                }),
                [name] if *name == OUTCOME_REPORTS_FOLDER => published.reports.extend(files),
                _ => debug!(folder = %folder.full_name, "Folder not part of the page"),
            }
        }

        published.assignments.sort_by(|a, b| a.name.cmp(&b.name));
        published
    }

    pub fn is_empty(&self) -> bool {
        self.syllabus.is_empty() && self.assignments.is_empty() && self.reports.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.syllabus.len()
            + self.reports.len()
            + self.assignments.iter().map(|a| a.files.len()).sum::<usize>()
    }

    fn of_kind(&self, kind: AssessmentKind) -> impl Iterator<Item = &PublishedAssignment> {
        self.assignments.iter().filter(move |a| a.kind() == kind)
    }
}

/// Path segments of `folder` below the `root` segment, or `None` when the
/// folder is not inside `root`.
fn relative_path<'a>(folder: &'a Folder, root: &str) -> Option<Vec<&'a str>> {
    let mut segments = folder.full_name.split('/');
    segments.by_ref().find(|s| *s == root)?;
    Some(segments.filter(|s| !s.is_empty()).collect())
}

/// Folders at or below `root` in the course Files area.
pub fn course_folders<'a>(folders: &'a [Folder], root: &str) -> Vec<&'a Folder> {
    folders
        .iter()
        .filter(|f| relative_path(f, root).is_some())
        .collect()
}

/// Builds links to files of the destination course.
#[derive(Debug, Clone)]
pub struct PageLinks {
    base_url: String,
    course_id: u64,
}

impl PageLinks {
    pub fn new(base_url: &str, course_id: u64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            course_id,
        }
    }

    pub fn file_url(&self, file: &FileInfo) -> String {
        format!("{}/courses/{}/files/{}", self.base_url, self.course_id, file.id)
    }

    fn anchor(&self, file: &FileInfo) -> String {
        format!(
            r#"<a href="{}">{}</a>"#,
            escape_html(&self.file_url(file)),
            escape_html(file.label())
        )
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn term_label(course: &Course) -> &str {
    course
        .term_name
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or("Unknown Term")
}

/// Page title, e.g. `CSE 310: Data Structures (Fall 2025)`.
pub fn page_title(course: &Course) -> String {
    format!("{}: {} ({})", course.course_code, course.name, term_label(course))
}

pub fn module_name(course: &Course) -> String {
    format!(
        "Courses - Course Folders and Student Work Samples ({})",
        term_label(course)
    )
}

fn assessment_cell(assignment: &PublishedAssignment, links: &PageLinks) -> String {
    match assignment.instrument() {
        Some(file) => format!(
            r#"<a href="{}">{}</a>"#,
            escape_html(&links.file_url(file)),
            escape_html(&assignment.name)
        ),
        None => escape_html(&assignment.name),
    }
}

fn graded_work_table<'a>(
    html: &mut String,
    heading: &str,
    assignments: impl Iterator<Item = &'a PublishedAssignment>,
    links: &PageLinks,
) {
    html.push_str(&format!("<p>{heading}</p>\n"));
    html.push_str(GRADED_WORK_HEADER);
    for assignment in assignments {
        let cells: Vec<String> = ["high", "avg", "low"]
            .iter()
            .map(|label| {
                assignment
                    .sample(label)
                    .map(|f| links.anchor(f))
                    .unwrap_or_default()
            })
            .collect();
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            assessment_cell(assignment, links),
            cells[0],
            cells[1],
            cells[2]
        ));
    }
    html.push_str("</tbody>\n</table>\n");
}

/// Renders the course page body.
pub fn build_course_page(published: &PublishedCourse, links: &PageLinks) -> String {
    let mut html = String::new();

    html.push_str("<h3>Syllabus and Course Schedule</h3>\n<ul>\n");
    for file in &published.syllabus {
        html.push_str(&format!("<li>{}</li>\n", links.anchor(file)));
    }
    html.push_str("</ul>\n");

    html.push_str("<h3>Lab Projects, Quizzes, and Exams</h3>\n<ul>\n");
    for (heading, kind) in [
        ("Lab Projects", AssessmentKind::Project),
        ("Exams", AssessmentKind::Exam),
    ] {
        html.push_str(&format!("<li>{heading}<ul>\n"));
        for assignment in published.of_kind(kind) {
            html.push_str(&format!("<li>{}</li>\n", assessment_cell(assignment, links)));
        }
        html.push_str("</ul></li>\n");
    }
    html.push_str("</ul>\n");

    html.push_str("<h3>Graded Student Work</h3>\n");
    graded_work_table(
        &mut html,
        "Lab Projects",
        published.of_kind(AssessmentKind::Project),
        links,
    );
    graded_work_table(&mut html, "Exams", published.of_kind(AssessmentKind::Exam), links);

    if !published.reports.is_empty() {
        html.push_str("<h3>Outcome Reports</h3>\n<ul>\n");
        for file in &published.reports {
            html.push_str(&format!("<li>{}</li>\n", links.anchor(file)));
        }
        html.push_str("</ul>\n");
    }

    html
}

/// What [`publish_course_page`] created.
#[derive(Debug)]
pub struct PagePublished {
    pub module: Module,
    pub page: Page,
    pub folders: usize,
    pub files: usize,
}

/// Builds the course page from what has been published for `course_id` into
/// `destination_course`, and links it from the semester's module, creating
/// the module when it does not exist yet.
#[tracing::instrument(skip(lms, publisher, base_url))]
pub async fn publish_course_page(
    lms: &dyn LmsApi,
    publisher: &dyn CoursePublisher,
    course_id: u64,
    destination_course: u64,
    base_url: &str,
) -> Result<PagePublished> {
    let course = lms
        .get_course(course_id)
        .await
        .context("course not found or access denied")?;
    let root = course_root_folder(&course);

    let folders = publisher
        .list_folders(destination_course)
        .await
        .context("listing course folders")?;
    let matching = course_folders(&folders, &root);
    if matching.is_empty() {
        bail!("no published folder {root} in course {destination_course}");
    }

    let mut listing = Vec::with_capacity(matching.len());
    for folder in &matching {
        let files = publisher
            .list_folder_files(folder.id)
            .await
            .with_context(|| format!("listing files of {}", folder.full_name))?;
        listing.push(((*folder).clone(), files));
    }

    let published = PublishedCourse::from_listing(&root, listing);
    let body = build_course_page(&published, &PageLinks::new(base_url, destination_course));

    let name = module_name(&course);
    let existing = publisher
        .list_modules(destination_course)
        .await
        .context("listing modules")?
        .into_iter()
        .find(|m| m.name == name);
    let module = match existing {
        Some(module) => {
            info!(module_id = module.id, "Reusing existing module");
            module
        }
        None => publisher.create_module(destination_course, &name).await?,
    };

    let page = publisher
        .create_page(destination_course, &page_title(&course), &body)
        .await?;
    publisher
        .add_page_to_module(destination_course, module.id, &page)
        .await?;

    info!(
        root = %root,
        module = %module.name,
        page = %page.url,
        files = published.file_count(),
        "Course page published"
    );

    Ok(PagePublished {
        module,
        page,
        folders: matching.len(),
        files: published.file_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct FolderListing {
        folder: Folder,
        files: Vec<FileInfo>,
    }

    fn published() -> PublishedCourse {
        let listings: Vec<FolderListing> =
            serde_json::from_str(include_str!("../tests/fixtures/published_folders.json")).unwrap();
        let folders: Vec<Folder> = listings.iter().map(|l| l.folder.clone()).collect();
        let kept: Vec<u64> = course_folders(&folders, "f25_CSE_310")
            .iter()
            .map(|f| f.id)
            .collect();

        PublishedCourse::from_listing(
            "f25_CSE_310",
            listings
                .into_iter()
                .filter(|l| kept.contains(&l.folder.id))
                .map(|l| (l.folder, l.files))
                .collect(),
        )
    }

    fn links() -> PageLinks {
        PageLinks::new("https://canvas.example.edu/", 555)
    }

    #[test]
    fn test_course_folders_match_whole_segment() {
        let folders = vec![
            Folder {
                id: 1,
                name: "f25_CSE_310".to_string(),
                full_name: "course files/f25_CSE_310".to_string(),
            },
            Folder {
                id: 2,
                name: "Syllabus".to_string(),
                full_name: "course files/f25_CSE_310/Syllabus".to_string(),
            },
            Folder {
                id: 3,
                name: "f25_CSE_3100".to_string(),
                full_name: "course files/f25_CSE_3100".to_string(),
            },
        ];

        let ids: Vec<u64> = course_folders(&folders, "f25_CSE_310").iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_listing_grouped_by_folder() {
        let published = published();

        assert_eq!(published.syllabus.len(), 2);
        assert_eq!(published.reports.len(), 1);
        let names: Vec<&str> = published.assignments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Midterm_Exam", "Project_1"]);
        assert_eq!(published.file_count(), 14);
    }

    #[test]
    fn test_assessment_kind() {
        assert_eq!(AssessmentKind::of("Midterm_Exam"), AssessmentKind::Exam);
        assert_eq!(AssessmentKind::of("Quiz_3"), AssessmentKind::Exam);
        assert_eq!(AssessmentKind::of("Project_1"), AssessmentKind::Project);
    }

    #[test]
    fn test_samples_and_instrument() {
        let published = published();
        let project = &published.assignments[1];

        assert_eq!(project.sample("high").map(|f| f.id), Some(1304));
        assert_eq!(project.sample("avg").map(|f| f.id), Some(1305));
        assert!(project.sample("low").is_none());
        assert_eq!(project.instrument().map(|f| f.id), Some(1301));

        let no_description = PublishedAssignment {
            name: "Lab".to_string(),
            files: vec![
                FileInfo {
                    id: 1,
                    filename: "grade_report_9.csv".to_string(),
                    ..Default::default()
                },
                FileInfo {
                    id: 2,
                    filename: "handout.pdf".to_string(),
                    ..Default::default()
                },
            ],
        };
        assert_eq!(no_description.instrument().map(|f| f.id), Some(2));
    }

    #[test]
    fn test_course_page_links_published_files() {
        let html = build_course_page(&published(), &links());

        assert!(html.contains(
            r#"<li><a href="https://canvas.example.edu/courses/555/files/1102">CSE310 Syllabus.pdf</a></li>"#
        ));
        assert!(html.contains(
            r#"<tr><td><a href="https://canvas.example.edu/courses/555/files/1301">Project_1</a></td><td><a href="https://canvas.example.edu/courses/555/files/1304">cse310-f25-Project_1-high.pdf</a></td><td><a href="https://canvas.example.edu/courses/555/files/1305">cse310-f25-Project_1-avg.docx</a></td><td></td></tr>"#
        ));
        assert!(html.contains(
            r#"<tr><td><a href="https://canvas.example.edu/courses/555/files/1401">Midterm_Exam</a></td><td><a href="https://canvas.example.edu/courses/555/files/1402">cse310-f25-Midterm_Exam-high.pdf</a></td><td></td><td><a href="https://canvas.example.edu/courses/555/files/1403">cse310-f25-Midterm_Exam-low.pdf</a></td></tr>"#
        ));
        assert!(html.contains("<h3>Outcome Reports</h3>"));
        assert!(html.contains("files/1501"));

        // Exams are listed after the projects in the overview.
        let projects = html.find("<li>Lab Projects<ul>").unwrap();
        let exams = html.find("<li>Exams<ul>").unwrap();
        assert!(projects < exams);
        assert!(!html.contains("files/2001"));
    }

    #[test]
    fn test_names_are_escaped() {
        let published = PublishedCourse {
            assignments: vec![PublishedAssignment {
                name: "Lab <1> & \"more\"".to_string(),
                files: Vec::new(),
            }],
            ..Default::default()
        };

        let html = build_course_page(&published, &links());
        assert!(html.contains("<li>Lab &lt;1&gt; &amp; &quot;more&quot;</li>"));
    }

    #[test]
    fn test_titles_use_term() {
        let course = Course::from_value(serde_json::json!({
            "id": 1,
            "name": "Data Structures",
            "course_code": "CSE 310",
            "term": {"name": "Fall 2025"}
        }))
        .unwrap();

        assert_eq!(page_title(&course), "CSE 310: Data Structures (Fall 2025)");
        assert_eq!(
            module_name(&course),
            "Courses - Course Folders and Student Work Samples (Fall 2025)"
        );
    }
}
