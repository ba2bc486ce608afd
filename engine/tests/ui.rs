mod ui {
    use engine::samples::ColorToggles;
    use engine::{KeyboardDrawer, Step};

    fn frame(toggles: &mut ColorToggles, drawer: &mut KeyboardDrawer) -> bool {
        drawer.begin_frame();
        let changed = toggles.on_update_ui_overlay(drawer);
        drawer.end_frame();
        changed
    }

    #[test]
    fn default_state_is_all_channels_on_black_background() {
        let mut toggles = ColorToggles::default();
        let mut drawer = KeyboardDrawer::new();

        assert!(!frame(&mut toggles, &mut drawer));
        assert_eq!(
            drawer.summary(),
            "1:Red=0.00  2:Green=0.00  3:Blue=0.00  4:[x]Red bit  5:[x]Green bit  6:[x]Blue bit"
        );
    }

    #[test]
    fn toggling_a_channel_twice_restores_it() {
        let mut toggles = ColorToggles::default();
        let mut drawer = KeyboardDrawer::new();

        drawer.press(4, Step::Up);
        assert!(frame(&mut toggles, &mut drawer));
        assert_eq!(toggles.channels, [true, false, true]);

        drawer.press(4, Step::Up);
        assert!(frame(&mut toggles, &mut drawer));
        assert_eq!(toggles, ColorToggles::default());
    }

    #[test]
    fn background_stays_in_unit_range() {
        let mut toggles = ColorToggles::default();
        let mut drawer = KeyboardDrawer::new();

        for _ in 0..15 {
            drawer.press(2, Step::Up);
        }
        assert!(frame(&mut toggles, &mut drawer));
        assert_eq!(toggles.background[2], 1.0);

        for _ in 0..15 {
            drawer.press(2, Step::Down);
        }
        assert!(frame(&mut toggles, &mut drawer));
        assert_eq!(toggles.background[2], 0.0);
    }

    #[test]
    fn clear_values_broadcast_background_with_zero_alpha() {
        let toggles = ColorToggles {
            background: [0.25, 0.5, 0.75],
            ..ColorToggles::default()
        };

        for value in toggles.clear_values() {
            let color = unsafe { value.color.float32 };
            assert_eq!(color, [0.25, 0.5, 0.75, 0.0]);
        }
    }
}
