// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Picture dependency graph.
//!
//! A single walk over the pictures in coded order assigns display order and wires each picture
//! to the anchors it predicts from. An anchor (I or P picture) is only given its display slot
//! once the next anchor arrives, since every B picture coded in between is displayed before it.

use log::debug;
use log::warn;

use crate::codec::mpeg2::parser::CodingType;
use crate::codec::mpeg2::parser::ParseError;
use crate::codec::mpeg2::parser::PictureCodingExtension;
use crate::codec::mpeg2::parser::FRAME_PICTURE;
use crate::codec::mpeg2::picture::Picture;

/// Assigns coded and display order to pictures as they are encountered in the stream.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    /// The older of the two most recent anchors.
    far_anchor: Option<usize>,
    /// The most recent anchor, whose display slot is still open.
    near_anchor: Option<usize>,
    coded_order: usize,
    display_order: usize,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    fn is_problem(pictures: &[Picture], anchor: Option<usize>) -> bool {
        anchor.map(|a| pictures[a].problem()).unwrap_or(true)
    }

    fn flush_near_anchor(&mut self, pictures: &mut [Picture]) {
        if let Some(anchor) = self.near_anchor {
            pictures[anchor].display_order = Some(self.display_order);
            self.display_order += 1;
        }
    }

    /// Adds the picture at index `index`, the next one in coded order.
    pub fn add_picture(&mut self, pictures: &mut [Picture], index: usize) {
        pictures[index].coded_order = self.coded_order;
        self.coded_order += 1;

        match pictures[index].coding_type {
            CodingType::B => {
                let broken = Self::is_problem(pictures, self.far_anchor)
                    || Self::is_problem(pictures, self.near_anchor);

                let pic = &mut pictures[index];
                pic.display_order = Some(self.display_order);
                self.display_order += 1;
                pic.forward_reference = self.far_anchor;
                pic.backward_reference = self.near_anchor;
                pic.broken = broken;
            }
            CodingType::P | CodingType::I => {
                if pictures[index].coding_type == CodingType::P {
                    let broken = Self::is_problem(pictures, self.near_anchor);
                    let pic = &mut pictures[index];
                    pic.forward_reference = self.near_anchor;
                    pic.broken = broken;
                }

                self.flush_near_anchor(pictures);
                self.far_anchor = self.near_anchor;
                self.near_anchor = Some(index);
            }
        }

        debug!(
            "picture {} coded {} type {}",
            index,
            pictures[index].coded_order,
            pictures[index].coding_type.as_char()
        );
    }

    /// Handles a sequence end code: no picture after it may reference the pending anchor.
    pub fn sequence_end(&mut self, pictures: &mut [Picture]) {
        self.flush_near_anchor(pictures);
        self.near_anchor = None;
    }

    /// Closes the graph and returns the coded index of every picture, in display order.
    pub fn finish(mut self, pictures: &mut [Picture]) -> Vec<usize> {
        if let Some(anchor) = self.near_anchor {
            if pictures[anchor].display_order.is_none() {
                warn!("stream ends without flushing anchor picture {}", anchor);
                pictures[anchor].unclean_last_anchor = true;
                self.flush_near_anchor(pictures);
                self.near_anchor = None;
            }
        }

        assert_eq!(
            self.coded_order, self.display_order,
            "coded and display orders disagree on the number of pictures"
        );
        assert_eq!(self.coded_order, pictures.len());

        let mut displayed = vec![None; pictures.len()];
        for (index, pic) in pictures.iter().enumerate() {
            let display = pic.display_order.expect("every picture has a display slot");
            assert!(displayed[display].is_none(), "display slot {} assigned twice", display);
            displayed[display] = Some(index);
        }

        displayed.into_iter().flatten().collect()
    }
}

/// Returns the number of fields a picture occupies on screen.
pub fn num_fields(ext: &PictureCodingExtension, progressive_sequence: bool) -> Result<u32, ParseError> {
    let fields = if ext.picture_structure != FRAME_PICTURE {
        1
    } else if progressive_sequence {
        match (ext.repeat_first_field, ext.top_field_first) {
            (false, _) => 2,
            (true, false) => 4,
            (true, true) => 6,
        }
    } else {
        match (ext.progressive_frame, ext.repeat_first_field) {
            (true, true) => 3,
            _ => 2,
        }
    };

    // Frame pictures always match one of the cases above. Keep the check for field pictures
    // created by hand.
    if fields == 0 {
        return Err(ParseError::StreamInvalid("picture has no fields".into()));
    }

    Ok(fields)
}

/// Assigns presentation times to `pictures`, visited in display order through `displayed`.
/// Each field lasts `ticks_per_field`; returns the end time of the last picture.
pub fn assign_presentation_times(
    pictures: &mut [Picture],
    displayed: &[usize],
    ticks_per_field: u64,
    progressive_sequence: impl Fn(&Picture) -> bool,
) -> Result<u64, ParseError> {
    let mut time = 0u64;
    for &index in displayed {
        let fields = num_fields(&pictures[index].extension, progressive_sequence(&pictures[index]))?;
        let pic = &mut pictures[index];
        pic.num_fields = fields;
        pic.presentation_time = time;
        time += ticks_per_field * fields as u64;
    }

    Ok(time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pictures(types: &str) -> Vec<Picture> {
        types
            .chars()
            .enumerate()
            .map(|(i, t)| {
                let coding_type = match t {
                    'I' => CodingType::I,
                    'P' => CodingType::P,
                    _ => CodingType::B,
                };
                Picture::new(i, coding_type, 0)
            })
            .collect()
    }

    fn build(types: &str) -> (Vec<Picture>, Vec<usize>) {
        let mut pics = pictures(types);
        let mut graph = GraphBuilder::new();
        for i in 0..pics.len() {
            graph.add_picture(&mut pics, i);
        }
        let displayed = graph.finish(&mut pics);
        (pics, displayed)
    }

    #[test]
    fn anchor_display_fixed_by_next_picture() {
        let mut pics = pictures("IPB");
        let mut graph = GraphBuilder::new();

        graph.add_picture(&mut pics, 0);
        assert_eq!(pics[0].display_order, None);

        graph.add_picture(&mut pics, 1);
        assert_eq!(pics[0].display_order, Some(0));
        assert_eq!(pics[1].display_order, None);

        graph.add_picture(&mut pics, 2);
        assert_eq!(pics[2].display_order, Some(1));
        assert_eq!(pics[1].display_order, None);

        let displayed = graph.finish(&mut pics);
        assert_eq!(pics[1].display_order, Some(2));
        assert!(pics[1].unclean_last_anchor);
        assert_eq!(displayed, vec![0, 2, 1]);

        assert_eq!(pics[1].forward_reference, Some(0));
        assert_eq!(pics[2].forward_reference, Some(0));
        assert_eq!(pics[2].backward_reference, Some(1));
        assert!(!pics[2].broken);
    }

    #[test]
    fn long_gop_reordering() {
        let (pics, displayed) = build("IPBBPBBIBB");
        let types: String = displayed.iter().map(|&i| pics[i].coding_type.as_char()).collect();
        assert_eq!(types, "IBBPBBPBBI");

        for (display, &coded) in displayed.iter().enumerate() {
            assert_eq!(pics[coded].display_order, Some(display));
        }

        for pic in pics.iter().filter(|p| p.coding_type == CodingType::B) {
            let forward = pics[pic.forward_reference.unwrap()].display_order.unwrap();
            let backward = pics[pic.backward_reference.unwrap()].display_order.unwrap();
            let own = pic.display_order.unwrap();
            assert!(forward < own && own < backward);
        }
    }

    #[test]
    fn leading_b_pictures_are_broken() {
        // An open GOP: the B pictures refer to an anchor before the start of the stream.
        let (pics, displayed) = build("IBBP");
        assert!(pics[1].broken && pics[2].broken);
        assert_eq!(pics[1].forward_reference, None);
        assert_eq!(displayed, vec![1, 2, 0, 3]);
    }

    #[test]
    fn broken_references_propagate() {
        let mut pics = pictures("IPPB");
        pics[0].incomplete = true;
        let mut graph = GraphBuilder::new();
        for i in 0..pics.len() {
            graph.add_picture(&mut pics, i);
        }
        graph.finish(&mut pics);

        assert!(pics[1].broken);
        assert!(pics[2].broken);
        assert!(pics[3].broken);
    }

    #[test]
    fn sequence_end_flushes_anchor() {
        let mut pics = pictures("IPI");
        let mut graph = GraphBuilder::new();
        graph.add_picture(&mut pics, 0);
        graph.add_picture(&mut pics, 1);
        graph.sequence_end(&mut pics);
        assert_eq!(pics[1].display_order, Some(1));

        graph.add_picture(&mut pics, 2);
        let displayed = graph.finish(&mut pics);
        assert_eq!(displayed, vec![0, 1, 2]);
        assert!(!pics[1].unclean_last_anchor);
        assert!(pics[2].unclean_last_anchor);
    }

    #[test]
    fn field_counts() {
        let ext = |rff, tff, pf| PictureCodingExtension {
            repeat_first_field: rff,
            top_field_first: tff,
            progressive_frame: pf,
            ..Default::default()
        };

        assert_eq!(num_fields(&ext(false, true, true), true).unwrap(), 2);
        assert_eq!(num_fields(&ext(true, false, true), true).unwrap(), 4);
        assert_eq!(num_fields(&ext(true, true, true), true).unwrap(), 6);
        assert_eq!(num_fields(&ext(false, false, false), false).unwrap(), 2);
        assert_eq!(num_fields(&ext(false, false, true), false).unwrap(), 2);
        assert_eq!(num_fields(&ext(true, false, true), false).unwrap(), 3);
    }

    #[test]
    fn presentation_times() {
        let (mut pics, displayed) = build("IPB");
        pics[2].extension.repeat_first_field = true;

        // 25 fps: numerator 25, denominator 1, one tick per field.
        let end = assign_presentation_times(&mut pics, &displayed, 1, |_| false).unwrap();
        assert_eq!(pics[0].presentation_time, 0);
        assert_eq!(pics[2].presentation_time, 2);
        assert_eq!(pics[1].presentation_time, 5);
        assert_eq!(end, 7);
    }
}
