use super::Rect;

/// Master/stack tiling. The first `nmaster` clients share a master
/// column of `mfact` of the usable width (full width while the stack is
/// empty), the rest share the remainder. Column heights are divided
/// incrementally: each client gets remaining-height / remaining-count,
/// so rounding remainders flow to later clients instead of drifting.
pub fn arrange(area: Rect, nmaster: i32, mfact: f32, border_widths: &[i32]) -> Vec<Rect> {
    let n = border_widths.len() as i32;
    if n == 0 {
        return Vec::new();
    }

    let master_width = if n > nmaster {
        if nmaster > 0 {
            (area.w as f32 * mfact) as i32
        } else {
            0
        }
    } else {
        area.w
    };

    let mut rects = Vec::with_capacity(border_widths.len());
    let mut master_y = 0;
    let mut stack_y = 0;

    for (i, &bw) in border_widths.iter().enumerate() {
        let i = i as i32;
        if i < nmaster {
            let h = (area.h - master_y) / (n.min(nmaster) - i);
            rects.push(Rect::new(
                area.x,
                area.y + master_y,
                master_width - 2 * bw,
                h - 2 * bw,
            ));
            if master_y + h < area.h {
                master_y += h;
            }
        } else {
            let h = (area.h - stack_y) / (n - i);
            rects.push(Rect::new(
                area.x + master_width,
                area.y + stack_y,
                area.w - master_width - 2 * bw,
                h - 2 * bw,
            ));
            if stack_y + h < area.h {
                stack_y += h;
            }
        }
    }

    rects
}

#[cfg(test)]
mod tests {
    use super::*;

    const AREA: Rect = Rect { x: 0, y: 20, w: 1920, h: 1060 };

    fn heights_sum(rects: &[Rect], bw: i32) -> i32 {
        rects.iter().map(|r| r.h + 2 * bw).sum()
    }

    #[test]
    fn no_clients_no_rects() {
        assert!(arrange(AREA, 1, 0.55, &[]).is_empty());
    }

    #[test]
    fn single_client_fills_the_area() {
        let rects = arrange(AREA, 1, 0.55, &[2]);
        assert_eq!(rects, vec![Rect::new(0, 20, 1920 - 4, 1060 - 4)]);
    }

    #[test]
    fn clients_up_to_nmaster_share_one_full_width_column() {
        let rects = arrange(AREA, 3, 0.55, &[1, 1, 1]);
        for rect in &rects {
            assert_eq!(rect.x, AREA.x);
            assert_eq!(rect.w, AREA.w - 2);
        }
        // Heights cover the area exactly up to the per-client rounding.
        let total = heights_sum(&rects, 1);
        assert!(AREA.h - total < rects.len() as i32, "drift {}", AREA.h - total);
        assert!(total <= AREA.h);
    }

    #[test]
    fn master_and_stack_partition_by_mfact() {
        let rects = arrange(AREA, 2, 0.6, &[0, 0, 0, 0, 0]);
        let master_width = (1920.0 * 0.6) as i32;

        let (masters, stack) = rects.split_at(2);

        for rect in masters {
            assert_eq!(rect.x, 0);
            assert_eq!(rect.w, master_width);
        }
        for rect in stack {
            assert_eq!(rect.x, master_width);
            assert_eq!(rect.w, 1920 - master_width);
        }
        assert_eq!(heights_sum(masters, 0), AREA.h);
        assert!(AREA.h - heights_sum(stack, 0) < 3);
    }

    #[test]
    fn zero_nmaster_gives_everything_to_the_stack() {
        let rects = arrange(AREA, 0, 0.5, &[0, 0]);
        for rect in &rects {
            assert_eq!(rect.x, 0);
            assert_eq!(rect.w, 1920);
        }
    }

    #[test]
    fn rounding_is_absorbed_not_accumulated() {
        // 1060 / 7 leaves a remainder; later clients must soak it up.
        let rects = arrange(AREA, 0, 0.5, &[0; 7]);
        let total: i32 = rects.iter().map(|r| r.h).sum();
        assert_eq!(total, AREA.h);
        let min = rects.iter().map(|r| r.h).min().unwrap();
        let max = rects.iter().map(|r| r.h).max().unwrap();
        assert!(max - min <= 1);
    }

    #[test]
    fn rects_stay_inside_the_area() {
        let rects = arrange(AREA, 1, 0.55, &[2; 6]);
        for rect in &rects {
            assert!(rect.x >= AREA.x);
            assert!(rect.y >= AREA.y);
            assert!(rect.x + rect.w + 4 <= AREA.x + AREA.w);
            assert!(rect.y + rect.h + 4 <= AREA.y + AREA.h);
        }
    }
}
