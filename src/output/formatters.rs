use crate::analysis::AnalysisResult;
use crate::twelvelabs::TranscriptSegment;
use crate::Result;

/// Render transcript segments as one line each, `[start-end] text` when both
/// timestamps are known. Segments without text are skipped.
pub fn format_transcript(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .filter_map(|segment| {
            let text = segment.value.as_deref().filter(|t| !t.is_empty())?;
            Some(match (segment.start, segment.end) {
                (Some(start), Some(end)) => format!("[{:.2}-{:.2}] {}", start, end, text),
                _ => text.to_string(),
            })
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Plain text report with transcript and analysis sections
pub fn format_as_text(result: &AnalysisResult) -> String {
    let mut output = String::new();

    output.push_str(&format!("Video ID: {} (matched by {})\n", result.video_id, result.resolved_by));
    output.push_str(&format!("Uploaded as: {}\n", result.uploaded_as));
    output.push_str(&format!(
        "Completed: {}\n\n",
        result.completed_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    output.push_str("== Transcript ==\n");
    if result.transcript.is_empty() {
        output.push_str("(no transcript available)\n");
    } else {
        output.push_str(&result.transcript);
        output.push('\n');
    }

    output.push_str("\n== Analysis ==\n");
    output.push_str(result.analysis.trim_end());
    output.push('\n');

    output
}

pub fn format_as_json(result: &AnalysisResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::resolver::ResolutionTier;

    fn sample_result() -> AnalysisResult {
        AnalysisResult {
            transcript: "[0.00-1.50] Hello".to_string(),
            analysis: "Strong structure.\n".to_string(),
            video_id: "vid-1".to_string(),
            resolved_by: ResolutionTier::Filename,
            asset_id: "asset-1".to_string(),
            indexed_asset_id: "ia-1".to_string(),
            uploaded_as: "rec.mp4".to_string(),
            completed_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_timestamped_segment() {
        let segments = vec![TranscriptSegment::new("hi", Some(1.0), Some(2.5))];
        assert_eq!(format_transcript(&segments), "[1.00-2.50] hi");
    }

    #[test]
    fn test_segment_without_timestamps() {
        let segments = vec![TranscriptSegment::new("hi", None, None)];
        assert_eq!(format_transcript(&segments), "hi");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(format_transcript(&[]), "");
    }

    #[test]
    fn test_mixed_segments() {
        let segments = vec![
            TranscriptSegment::new("first", Some(0.0), Some(1.234)),
            TranscriptSegment::default(),
            TranscriptSegment::new("", Some(1.3), Some(2.0)),
            TranscriptSegment::new("only start", Some(2.0), None),
            TranscriptSegment::new("last ", Some(10.0), Some(12.006)),
        ];

        assert_eq!(
            format_transcript(&segments),
            "[0.00-1.23] first\nonly start\n[10.00-12.01] last"
        );
    }

    #[test]
    fn test_text_report_sections() {
        let text = format_as_text(&sample_result());

        assert!(text.contains("Video ID: vid-1 (matched by filename)"));
        assert!(text.contains("== Transcript ==\n[0.00-1.50] Hello"));
        assert!(text.ends_with("== Analysis ==\nStrong structure.\n"));
    }

    #[test]
    fn test_json_report() {
        let json = format_as_json(&sample_result()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["video_id"], "vid-1");
        assert_eq!(value["resolved_by"], "filename");
        assert_eq!(value["transcript"], "[0.00-1.50] Hello");
    }
}
