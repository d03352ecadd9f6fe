//! Filter graph construction: temporal resampling, blur compositing, final scale.

use crate::domain::VideoRect;

/// Final output height; width follows the aspect ratio and stays even
pub const OUTPUT_HEIGHT: u32 = 1080;
pub const SCALE_FLAGS: &str = "lanczos";
pub const BLUR_RADIUS: u32 = 20;
pub const BLUR_PASSES: u32 = 2;
/// Label of the graph's output pad when blur compositing is used
pub const OUTPUT_LABEL: &str = "out";

/// A complete filter graph expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterGraph {
    pub expression: String,
    /// Output pad to map, when the graph uses labelled pads
    pub output_label: Option<String>,
}

impl FilterGraph {
    /// Build the graph for a temporal filter and the honored blur rectangles.
    pub fn build(temporal: &str, regions: &[VideoRect]) -> Self {
        if regions.is_empty() {
            return FilterGraph {
                expression: format!("{},{}", temporal, scale_filter()),
                output_label: None,
            };
        }

        FilterGraph {
            expression: blur_graph(temporal, regions),
            output_label: Some(OUTPUT_LABEL.to_string()),
        }
    }

    /// Argument form for `-map`
    pub fn map_target(&self) -> Option<String> {
        self.output_label.as_ref().map(|label| format!("[{}]", label))
    }
}

fn scale_filter() -> String {
    format!("scale=-2:{}:flags={}", OUTPUT_HEIGHT, SCALE_FLAGS)
}

/// Box blur clamped to what the cropped planes can hold. A 20px region only has
/// 10px chroma planes, which would reject a fixed radius of 20.
fn blur_filter() -> String {
    format!(
        "boxblur=luma_radius='min({r},min(w,h)/2)':luma_power={p}:chroma_radius='min({r},min(cw,ch)/2)':chroma_power={p}",
        r = BLUR_RADIUS,
        p = BLUR_PASSES
    )
}

fn crop_filter(rect: &VideoRect) -> String {
    format!("crop={}:{}:{}:{}", rect.width, rect.height, rect.x, rect.y)
}

/// Split into a base plus one branch per region, blur each branch, then overlay the
/// blurred crops back in region order and scale once at the end.
fn blur_graph(temporal: &str, regions: &[VideoRect]) -> String {
    let n = regions.len();
    let mut chains: Vec<String> = Vec::with_capacity(2 * n + 1);

    let branch_labels: String = (0..n).map(|i| format!("[r{}]", i)).collect();
    chains.push(format!(
        "[0:v]{},split={}[base]{}",
        temporal,
        n + 1,
        branch_labels
    ));

    for (i, rect) in regions.iter().enumerate() {
        chains.push(format!(
            "[r{i}]{},{}[b{i}]",
            crop_filter(rect),
            blur_filter(),
            i = i
        ));
    }

    let mut current = "base".to_string();
    for (i, rect) in regions.iter().enumerate() {
        let overlay = format!("[{}][b{}]overlay={}:{}", current, i, rect.x, rect.y);
        if i + 1 == n {
            chains.push(format!("{},{}[{}]", overlay, scale_filter(), OUTPUT_LABEL));
        } else {
            current = format!("o{}", i);
            chains.push(format!("{}[{}]", overlay, current));
        }
    }

    chains.join(";")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(index: usize, x: u32, y: u32, width: u32, height: u32) -> VideoRect {
        VideoRect {
            index,
            x,
            y,
            width,
            height,
        }
    }

    const TEMPORAL: &str = "setpts=0.25*PTS,fps=60";

    #[test]
    fn test_no_regions() {
        let graph = FilterGraph::build(TEMPORAL, &[]);
        assert_eq!(
            graph.expression,
            "setpts=0.25*PTS,fps=60,scale=-2:1080:flags=lanczos"
        );
        assert!(graph.map_target().is_none());
    }

    #[test]
    fn test_single_region() {
        let graph = FilterGraph::build(TEMPORAL, &[rect(0, 225, 225, 450, 360)]);
        let chains: Vec<&str> = graph.expression.split(';').collect();

        assert_eq!(chains.len(), 3);
        assert_eq!(chains[0], "[0:v]setpts=0.25*PTS,fps=60,split=2[base][r0]");
        assert!(chains[1].starts_with("[r0]crop=450:360:225:225,boxblur="));
        assert!(chains[1].contains("luma_power=2"));
        assert!(chains[1].ends_with("[b0]"));
        assert_eq!(
            chains[2],
            "[base][b0]overlay=225:225,scale=-2:1080:flags=lanczos[out]"
        );
        assert_eq!(graph.map_target().as_deref(), Some("[out]"));
    }

    #[test]
    fn test_multiple_regions_overlay_in_order() {
        let graph = FilterGraph::build(
            TEMPORAL,
            &[
                rect(0, 0, 0, 100, 100),
                rect(2, 50, 50, 100, 100),
                rect(3, 400, 10, 40, 40),
            ],
        );
        let chains: Vec<&str> = graph.expression.split(';').collect();

        assert_eq!(chains.len(), 7);
        assert!(chains[0].ends_with("split=4[base][r0][r1][r2]"));
        assert!(chains[3].starts_with("[r2]crop=40:40:400:10,"));
        assert_eq!(chains[4], "[base][b0]overlay=0:0[o0]");
        assert_eq!(chains[5], "[o0][b1]overlay=50:50[o1]");
        assert_eq!(
            chains[6],
            "[o1][b2]overlay=400:10,scale=-2:1080:flags=lanczos[out]"
        );
        // Scaled exactly once
        assert_eq!(graph.expression.matches("scale=-2:1080").count(), 1);
    }
}
