use proptest::prelude::*;
use weft_core::{Renderer, xml};
use weft_signals::ObservableCell;

proptest! {
    #[test]
    fn test_interpolated_text_is_never_parsed(text in "\\PC{0,40}") {
        let renderer = Renderer::new();
        let view = renderer.render(xml!("<p>{}</p>", text.clone())).unwrap();
        let content = renderer.dom().borrow().text_content(view.fragment());
        prop_assert_eq!(content, text);
    }

    #[test]
    fn test_cell_text_tracks_every_write(writes in prop::collection::vec("[a-z]{0,8}", 1..8)) {
        let renderer = Renderer::new();
        let cell = ObservableCell::new(String::new());
        let view = renderer.render(xml!("<p>{}</p>", &cell)).unwrap();
        for value in &writes {
            cell.set(value.clone());
            while weft_scheduler::tick() {}
            let content = renderer.dom().borrow().text_content(view.fragment());
            prop_assert_eq!(&content, value);
        }
    }
}
